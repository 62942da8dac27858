//! Error surface shared by the claims gateway and user directory ports.

use super::define_port_error;

define_port_error! {
    /// Errors surfaced while calling the upstream claims service.
    pub enum GatewayError by FailureKind {
        /// The caller is not permitted to read the resource.
        Forbidden { message: String } [Forbidden] =>
            "upstream denied access: {message}",
        /// The resource does not exist upstream.
        NotFound { message: String } [NotFound] =>
            "upstream resource not found: {message}",
        /// The session is missing or expired.
        Unauthorized { message: String } [Rejected] =>
            "upstream rejected credentials: {message}",
        /// Network transport failed before receiving a response.
        Transport { message: String } [Transient] =>
            "upstream transport failed: {message}",
        /// The call exceeded its timeout.
        Timeout { message: String } [Transient] =>
            "upstream timeout: {message}",
        /// The service rate-limited the request.
        RateLimited { message: String } [Transient] =>
            "upstream rate limited request: {message}",
        /// The response could not be decoded.
        Decode { message: String } [Rejected] =>
            "upstream response decode failed: {message}",
        /// The request was rejected as malformed.
        InvalidRequest { message: String } [Rejected] =>
            "upstream request invalid: {message}",
    }
}

/// Coarse failure category driving cache and pipeline decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Terminal for the id within a session.
    Forbidden,
    /// The resource is gone; not retried this pass.
    NotFound,
    /// Worth retrying on a later pass.
    Transient,
    /// The request itself was wrong, or the session is invalid.
    Rejected,
}

impl GatewayError {
    /// Return whether retrying this error is expected to help.
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::forbidden(GatewayError::forbidden("u1"), FailureKind::Forbidden, false)]
    #[case::not_found(GatewayError::not_found("u1"), FailureKind::NotFound, false)]
    #[case::timeout(GatewayError::timeout("slow"), FailureKind::Transient, true)]
    #[case::rate_limited(GatewayError::rate_limited("429"), FailureKind::Transient, true)]
    #[case::decode(GatewayError::decode("bad json"), FailureKind::Rejected, false)]
    #[case::unauthorized(GatewayError::unauthorized("expired"), FailureKind::Rejected, false)]
    fn classifies_failures(
        #[case] error: GatewayError,
        #[case] kind: FailureKind,
        #[case] retryable: bool,
    ) {
        assert_eq!(error.kind(), kind);
        assert_eq!(error.is_retryable(), retryable);
    }
}

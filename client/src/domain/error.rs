//! Domain-level error types.
//!
//! These errors are transport agnostic. The HTTP adapter reports failures as
//! [`GatewayError`] values, which are folded into [`Error`] before reaching
//! store callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ports::{FailureKind, GatewayError};
use super::user::IdValidationError;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// Authentication failed or is missing.
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    Forbidden,
    /// The requested resource does not exist.
    NotFound,
    /// The upstream service could not be reached; retrying may help.
    Transient,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

impl ErrorCode {
    fn fallback_message(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Transient => "upstream temporarily unavailable",
            Self::InternalError => "internal error",
        }
    }
}

/// Failure returned by store operations.
///
/// The message is never blank; [`Error::new`] substitutes a generic text for
/// the code when given one.
///
/// # Examples
/// ```
/// use claims_client::domain::{Error, ErrorCode};
///
/// let err = Error::new(ErrorCode::NotFound, "claim c1");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// assert_eq!(Error::new(ErrorCode::Forbidden, " ").message(), "forbidden");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    code: ErrorCode,
    message: String,
}

impl Error {
    /// Build an error with `code` and `message`.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            code.fallback_message().to_owned()
        } else {
            message
        };
        Self { code, message }
    }

    /// Failure category.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transient, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl From<GatewayError> for Error {
    fn from(value: GatewayError) -> Self {
        let message = value.to_string();
        match value.kind() {
            FailureKind::Forbidden => Self::forbidden(message),
            FailureKind::NotFound => Self::not_found(message),
            FailureKind::Transient => Self::transient(message),
            FailureKind::Rejected => match value {
                GatewayError::Unauthorized { .. } => Self::unauthorized(message),
                GatewayError::Decode { .. } => Self::internal(message),
                _ => Self::invalid_request(message),
            },
        }
    }
}

impl From<IdValidationError> for Error {
    fn from(value: IdValidationError) -> Self {
        Self::invalid_request(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    //! Construction and mapping coverage for domain errors.
    use rstest::rstest;

    use super::*;

    #[test]
    fn blank_messages_fall_back_to_the_code_text() {
        let err = Error::new(ErrorCode::Transient, "  ");
        assert_eq!(err.message(), "upstream temporarily unavailable");
        assert_eq!(Error::internal("").message(), "internal error");
    }

    #[rstest]
    #[case::forbidden(GatewayError::forbidden("u1"), ErrorCode::Forbidden)]
    #[case::not_found(GatewayError::not_found("c1"), ErrorCode::NotFound)]
    #[case::timeout(GatewayError::timeout("10s"), ErrorCode::Transient)]
    #[case::transport(GatewayError::transport("reset"), ErrorCode::Transient)]
    #[case::unauthorized(GatewayError::unauthorized("expired"), ErrorCode::Unauthorized)]
    #[case::decode(GatewayError::decode("eof"), ErrorCode::InternalError)]
    #[case::invalid(GatewayError::invalid_request("amount"), ErrorCode::InvalidRequest)]
    fn gateway_errors_map_to_codes(#[case] source: GatewayError, #[case] expected: ErrorCode) {
        let message = source.to_string();
        let err = Error::from(source);
        assert_eq!(err.code(), expected);
        assert_eq!(err.message(), message);
    }

    #[test]
    fn id_validation_is_an_invalid_request() {
        let err = Error::from(IdValidationError::Empty);
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn serialises_snake_case_codes() {
        let json = serde_json::to_value(Error::transient("retry")).expect("serialise");
        assert_eq!(json, serde_json::json!({ "code": "transient", "message": "retry" }));
    }
}

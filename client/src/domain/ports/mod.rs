//! Domain ports for the upstream claims service.

mod macros;
pub(crate) use macros::define_port_error;

mod claims_gateway;
mod gateway_error;
mod user_directory;

#[cfg(test)]
pub use claims_gateway::MockClaimsGateway;
pub use claims_gateway::{
    ClaimListQuery, ClaimScope, ClaimsGateway, FixtureClaimsGateway, RawClaimList,
    RawClaimRecord, SortDirection,
};
pub use gateway_error::{FailureKind, GatewayError};
#[cfg(test)]
pub use user_directory::MockUserDirectory;
pub use user_directory::{FixtureUserDirectory, UserDirectory};

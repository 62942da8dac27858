//! Driven port for user lookups and limit figures.
//!
//! Several endpoints here are permission-gated upstream: a caller may be
//! denied a direct user lookup yet allowed to read their own manager or the
//! manager list. Which endpoint to use is decided by the resolver, not here.

use async_trait::async_trait;
use serde_json::Value;

use super::GatewayError;
use crate::domain::user::UserId;

/// Port for the user half of the upstream service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetch one user record by id. Permission-gated.
    async fn fetch_user(&self, id: &UserId) -> Result<Value, GatewayError>;

    /// Fetch the manager of `employee`, if they have one.
    ///
    /// Callers may always ask for their own manager.
    async fn fetch_manager_of(&self, employee: &UserId) -> Result<Option<Value>, GatewayError>;

    /// Fetch the bounded list of managers visible to every role.
    async fn fetch_managers_batch(&self) -> Result<Vec<Value>, GatewayError>;

    /// Fetch limit figures for one user.
    async fn fetch_user_summary(&self, user: &UserId) -> Result<Value, GatewayError>;

    /// Fetch limit figures for every user. Restricted to elevated roles.
    async fn fetch_summary_list(&self) -> Result<Vec<Value>, GatewayError>;
}

/// Fixture implementation that knows no users.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureUserDirectory;

#[async_trait]
impl UserDirectory for FixtureUserDirectory {
    async fn fetch_user(&self, id: &UserId) -> Result<Value, GatewayError> {
        Err(GatewayError::not_found(id.to_string()))
    }

    async fn fetch_manager_of(&self, _employee: &UserId) -> Result<Option<Value>, GatewayError> {
        Ok(None)
    }

    async fn fetch_managers_batch(&self) -> Result<Vec<Value>, GatewayError> {
        Ok(Vec::new())
    }

    async fn fetch_user_summary(&self, user: &UserId) -> Result<Value, GatewayError> {
        Err(GatewayError::not_found(user.to_string()))
    }

    async fn fetch_summary_list(&self) -> Result<Vec<Value>, GatewayError> {
        Ok(Vec::new())
    }
}

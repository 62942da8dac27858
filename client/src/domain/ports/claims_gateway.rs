//! Driven port for reading and mutating claims upstream.
//!
//! The domain owns the request shapes; responses stay raw JSON so every
//! record passes through the normaliser and the summary reconciler.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use super::GatewayError;
use crate::domain::claim::{ClaimDraft, ClaimId, ClaimPatch, ClaimStatus, ClaimTransition};

/// Which claim listing to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimScope {
    /// Claims created by the caller.
    Mine,
    /// Claims awaiting the caller's approval.
    Team,
    /// Claims visible to finance.
    Finance,
}

impl ClaimScope {
    /// Upstream path segment for this listing.
    pub fn segment(self) -> &'static str {
        match self {
            Self::Mine => "mine",
            Self::Team => "team",
            Self::Finance => "finance",
        }
    }
}

impl fmt::Display for ClaimScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Sort order for claim listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Oldest or smallest first.
    Asc,
    /// Newest or largest first.
    Desc,
}

impl SortDirection {
    /// Query-string value for this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Paging, sorting and filtering for a claim listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimListQuery {
    /// One-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
    /// Field to sort by, e.g. `createdAt`.
    pub sort_by: Option<String>,
    /// Sort direction.
    pub sort_dir: Option<SortDirection>,
    /// Restrict to one status.
    pub status: Option<ClaimStatus>,
}

impl ClaimListQuery {
    /// Copy of this query addressing `page`.
    #[must_use]
    pub fn for_page(&self, page: u32) -> Self {
        Self {
            page: Some(page),
            ..self.clone()
        }
    }
}

/// One page of raw claims.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawClaimList {
    /// Raw claim records, in upstream order.
    pub claims: Vec<Value>,
    /// The full response body, for limit figures carried alongside the list.
    pub summary_fragment: Option<Value>,
    /// Total page count, when the service reports one.
    pub total_pages: Option<u32>,
}

/// A single raw claim returned by a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClaimRecord {
    /// The claim record, with any envelope removed.
    pub claim: Value,
    /// The full response body, for limit figures carried alongside the claim.
    pub summary_fragment: Option<Value>,
}

/// Port for the claims half of the upstream service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClaimsGateway: Send + Sync {
    /// Fetch one page of a claim listing.
    async fn fetch_claim_list(
        &self,
        scope: ClaimScope,
        query: &ClaimListQuery,
    ) -> Result<RawClaimList, GatewayError>;

    /// Fetch one claim with its references populated.
    async fn fetch_claim_detail(&self, id: &ClaimId) -> Result<Value, GatewayError>;

    /// Create a draft claim.
    async fn create_claim(&self, draft: &ClaimDraft) -> Result<RawClaimRecord, GatewayError>;

    /// Update a draft claim.
    async fn update_claim(
        &self,
        id: &ClaimId,
        patch: &ClaimPatch,
    ) -> Result<RawClaimRecord, GatewayError>;

    /// Submit a draft for approval.
    async fn submit_claim(&self, id: &ClaimId) -> Result<RawClaimRecord, GatewayError>;

    /// Apply a manager or finance workflow transition.
    async fn transition_claim(
        &self,
        id: &ClaimId,
        transition: &ClaimTransition,
    ) -> Result<RawClaimRecord, GatewayError>;

    /// Delete a claim.
    async fn delete_claim(&self, id: &ClaimId) -> Result<(), GatewayError>;
}

/// Fixture implementation with no claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureClaimsGateway;

#[async_trait]
impl ClaimsGateway for FixtureClaimsGateway {
    async fn fetch_claim_list(
        &self,
        _scope: ClaimScope,
        _query: &ClaimListQuery,
    ) -> Result<RawClaimList, GatewayError> {
        Ok(RawClaimList::default())
    }

    async fn fetch_claim_detail(&self, id: &ClaimId) -> Result<Value, GatewayError> {
        Err(GatewayError::not_found(id.to_string()))
    }

    async fn create_claim(&self, _draft: &ClaimDraft) -> Result<RawClaimRecord, GatewayError> {
        Err(GatewayError::invalid_request("fixture gateway is read-only"))
    }

    async fn update_claim(
        &self,
        id: &ClaimId,
        _patch: &ClaimPatch,
    ) -> Result<RawClaimRecord, GatewayError> {
        Err(GatewayError::not_found(id.to_string()))
    }

    async fn submit_claim(&self, id: &ClaimId) -> Result<RawClaimRecord, GatewayError> {
        Err(GatewayError::not_found(id.to_string()))
    }

    async fn transition_claim(
        &self,
        id: &ClaimId,
        _transition: &ClaimTransition,
    ) -> Result<RawClaimRecord, GatewayError> {
        Err(GatewayError::not_found(id.to_string()))
    }

    async fn delete_claim(&self, id: &ClaimId) -> Result<(), GatewayError> {
        Err(GatewayError::not_found(id.to_string()))
    }
}

//! Domain model and services for claim reconciliation and enrichment.
//!
//! Purpose: turn heterogeneous upstream claim and user records into one
//! canonical model, keep the caller's limit summary consistent, and resolve
//! user display names without issuing lookups the caller is not allowed to
//! make.
//!
//! Public surface:
//! - Claim, UserRef, SessionIdentity: the canonical data model.
//! - normalize, reconcile: pure payload handling.
//! - EnrichmentCache, RoleAwareResolver: name resolution.
//! - ClaimStore: the session's claim collection and its pipeline.
//! - Error, ErrorCode: transport-agnostic failures.

pub mod claim;
pub mod claim_store;
pub mod enrichment_cache;
pub mod error;
pub mod normalizer;
pub mod ports;
mod raw;
pub mod resolver;
pub mod summary;
pub mod user;

pub use self::claim::{
    Claim, ClaimDraft, ClaimField, ClaimId, ClaimPatch, ClaimStatus, ClaimTransition,
};
pub use self::claim_store::{
    ClaimStore, ClaimStorePorts, ClaimUpdate, EnrichmentReport, EnrichmentTicket,
    ResolutionState, StoreSettings, UserLimit,
};
pub use self::enrichment_cache::EnrichmentCache;
pub use self::error::{Error, ErrorCode};
pub use self::normalizer::{normalize, normalize_user};
pub use self::resolver::RoleAwareResolver;
pub use self::summary::{Summary, reconcile};
pub use self::user::{
    DirectoryUser, IdValidationError, Role, SessionIdentity, UNKNOWN_NAME, UserId, UserRef,
};

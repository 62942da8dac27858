//! The lookup decision: which route may safely resolve one user reference.

use crate::domain::claim::{Claim, ClaimField, ClaimId};
use crate::domain::user::{Role, SessionIdentity, UserId};

/// Where a user reference sits, as far as permissions are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    /// Which reference on the claim is being resolved.
    pub field: ClaimField,
    /// Claim carrying the reference.
    pub claim_id: Option<ClaimId>,
    /// Creator of that claim.
    pub creator_id: Option<UserId>,
    /// Approving manager of that claim.
    pub manager_id: Option<UserId>,
}

impl Relationship {
    /// Describe the `field` reference of `claim`.
    pub fn for_claim(claim: &Claim, field: ClaimField) -> Self {
        Self {
            field,
            claim_id: claim.id.clone(),
            creator_id: claim.created_by.as_ref().map(|user| user.id.clone()),
            manager_id: claim.manager.as_ref().map(|user| user.id.clone()),
        }
    }
}

/// An endpoint the caller may read that embeds the target's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DelegateEndpoint {
    /// "My manager" lookup for the given employee (always the caller).
    ManagerOf(UserId),
    /// Full detail of a claim assigned to the caller for approval.
    ClaimDetail(ClaimId),
}

/// Why a reference was left alone this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The upstream already denied a direct lookup and no other route fits.
    Forbidden,
    /// No route is authorised for this caller and relationship.
    NoAuthorisedRoute,
}

/// Lookup route chosen for one reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Fetch the user by id.
    Direct,
    /// Fetch the bounded manager list once per pass and pick the target.
    BatchManagers,
    /// Read a parent record the caller is authorised to see.
    Delegate(DelegateEndpoint),
    /// Leave the reference unresolved.
    Skip(SkipReason),
}

/// Choose the safe lookup route for `target`.
///
/// Cached targets never reach this function. `forbidden` reports whether a
/// direct lookup of `target` was already denied this session; such targets
/// may still be resolved through a delegate or the manager list.
///
/// # Examples
/// ```
/// use claims_client::domain::resolver::{Relationship, SkipReason, Strategy, decide};
/// use claims_client::domain::{ClaimField, ClaimId, Role, SessionIdentity, UserId};
///
/// let me = UserId::new("mgr").expect("valid id");
/// let caller = SessionIdentity::new(me, Role::Manager);
/// let stranger = UserId::new("u9").expect("valid id");
/// let relationship = Relationship {
///     field: ClaimField::CreatedBy,
///     claim_id: Some(ClaimId::new("c1").expect("valid id")),
///     creator_id: Some(stranger.clone()),
///     manager_id: None,
/// };
///
/// assert_eq!(
///     decide(&caller, &stranger, &relationship, false),
///     Strategy::BatchManagers
/// );
/// ```
pub fn decide(
    caller: &SessionIdentity,
    target: &UserId,
    relationship: &Relationship,
    forbidden: bool,
) -> Strategy {
    let is_self = *target == caller.id;
    if !forbidden && (is_self || caller.role.is_elevated()) {
        return Strategy::Direct;
    }

    if relationship.field == ClaimField::Manager
        && relationship.creator_id.as_ref() == Some(&caller.id)
    {
        return Strategy::Delegate(DelegateEndpoint::ManagerOf(caller.id.clone()));
    }

    if caller.role == Role::Manager
        && relationship.field == ClaimField::CreatedBy
        && relationship.manager_id.as_ref() == Some(&caller.id)
    {
        if let Some(claim_id) = &relationship.claim_id {
            return Strategy::Delegate(DelegateEndpoint::ClaimDetail(claim_id.clone()));
        }
    }

    if relationship.field == ClaimField::Manager || caller.role == Role::Manager {
        return Strategy::BatchManagers;
    }

    if forbidden {
        Strategy::Skip(SkipReason::Forbidden)
    } else {
        Strategy::Skip(SkipReason::NoAuthorisedRoute)
    }
}

//! Role-aware resolution of user references.
//!
//! Some upstream lookups are authorised only for particular relationships
//! (self, own manager, claims awaiting the caller's approval). A denied
//! direct lookup fails and poisons the id for the session, so the resolver
//! picks a safe route per reference before any request is made.

use std::sync::Arc;

use tracing::{debug, warn};

use super::claim::{ClaimField, ClaimId};
use super::enrichment_cache::EnrichmentCache;
use super::normalizer::{normalize, normalize_user};
use super::ports::{ClaimsGateway, UserDirectory};
use super::user::{SessionIdentity, UserId, UserRef};

mod pass;
mod strategy;

pub use pass::EnrichmentPass;
pub use strategy::{DelegateEndpoint, Relationship, SkipReason, Strategy, decide};

/// Executes [`decide`] against the cache and the upstream ports.
pub struct RoleAwareResolver {
    caller: SessionIdentity,
    cache: Arc<EnrichmentCache>,
    directory: Arc<dyn UserDirectory>,
    claims: Arc<dyn ClaimsGateway>,
}

impl RoleAwareResolver {
    /// Build a resolver acting for `caller`.
    pub fn new(
        caller: SessionIdentity,
        cache: Arc<EnrichmentCache>,
        directory: Arc<dyn UserDirectory>,
        claims: Arc<dyn ClaimsGateway>,
    ) -> Self {
        Self {
            caller,
            cache,
            directory,
            claims,
        }
    }

    /// The identity lookups are made for.
    pub fn caller(&self) -> &SessionIdentity {
        &self.caller
    }

    /// Resolve `target` through the safest route available this pass.
    ///
    /// Returns the cached reference when one exists. Batch and delegate
    /// routes write everything they learn into the cache, then read the
    /// target back from it.
    pub async fn resolve(
        &self,
        target: &UserId,
        relationship: &Relationship,
        pass: &EnrichmentPass,
    ) -> Option<UserRef> {
        if let Some(user) = self.cache.get(target) {
            return Some(user);
        }

        let forbidden = self.cache.is_forbidden(target);
        match decide(&self.caller, target, relationship, forbidden) {
            Strategy::Direct => self.cache.resolve_id(target).await,
            Strategy::BatchManagers => {
                self.through_managers(pass).await;
                self.cache.get(target)
            }
            Strategy::Delegate(DelegateEndpoint::ManagerOf(employee)) => {
                pass.once_manager_of(&employee, || self.load_manager_of(&employee, pass))
                    .await;
                match self.cache.get(target) {
                    Some(user) => Some(user),
                    None if relationship.field == ClaimField::Manager => {
                        self.through_managers(pass).await;
                        self.cache.get(target)
                    }
                    None => None,
                }
            }
            Strategy::Delegate(DelegateEndpoint::ClaimDetail(claim)) => {
                pass.once_claim_detail(&claim, || self.load_claim_detail(&claim, pass))
                    .await;
                self.cache.get(target)
            }
            Strategy::Skip(reason) => {
                debug!(
                    pass_id = %pass.id(),
                    user_id = %target,
                    field = %relationship.field,
                    ?reason,
                    "no authorised lookup route"
                );
                None
            }
        }
    }

    async fn through_managers(&self, pass: &EnrichmentPass) {
        pass.once_managers(|| self.load_managers(pass)).await;
    }

    async fn load_managers(&self, pass: &EnrichmentPass) {
        match self.directory.fetch_managers_batch().await {
            Ok(records) => {
                let mut learned = 0_usize;
                for record in records.iter().filter_map(normalize_user) {
                    if self.cache.remember_directory_user(record) {
                        learned += 1;
                    }
                }
                debug!(pass_id = %pass.id(), fetched = records.len(), learned, "manager list loaded");
            }
            Err(error) => {
                warn!(pass_id = %pass.id(), %error, "manager list lookup failed");
            }
        }
    }

    async fn load_manager_of(&self, employee: &UserId, pass: &EnrichmentPass) {
        match self.directory.fetch_manager_of(employee).await {
            Ok(Some(raw)) => {
                if let Some(record) = normalize_user(&raw) {
                    self.cache
                        .link_manager(employee.clone(), record.user.id.clone());
                    self.cache.remember_directory_user(record);
                }
            }
            Ok(None) => {
                debug!(pass_id = %pass.id(), user_id = %employee, "no manager on record");
            }
            Err(error) => {
                warn!(pass_id = %pass.id(), user_id = %employee, %error, "manager lookup denied or failed");
            }
        }
    }

    async fn load_claim_detail(&self, claim: &ClaimId, pass: &EnrichmentPass) {
        match self.claims.fetch_claim_detail(claim).await {
            Ok(raw) => {
                let detail = normalize(&raw);
                for user in [detail.created_by, detail.manager].into_iter().flatten() {
                    self.cache.remember(user);
                }
            }
            Err(error) => {
                warn!(pass_id = %pass.id(), claim_id = %claim, %error, "claim detail lookup failed");
            }
        }
    }
}

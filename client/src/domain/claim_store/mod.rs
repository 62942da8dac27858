//! Claim collection store.
//!
//! The store owns the claim list and the limit summary for one session and
//! drives the pipeline behind every operation:
//!
//! 1. normalise the raw records;
//! 2. reconcile the summary from the same payload;
//! 3. inject locally known names (own identity, cache hits, own manager);
//! 4. replace or append by identity;
//! 5. spawn a background enrichment pass and return without awaiting it.
//!
//! A failed upstream call returns its error and leaves claims and summary
//! untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use super::claim::{Claim, ClaimDraft, ClaimField, ClaimId, ClaimPatch, ClaimStatus, ClaimTransition};
use super::enrichment_cache::EnrichmentCache;
use super::error::Error;
use super::normalizer::{normalize, normalize_user};
use super::ports::{
    ClaimListQuery, ClaimScope, ClaimsGateway, GatewayError, RawClaimList, RawClaimRecord,
    UserDirectory,
};
use super::resolver::RoleAwareResolver;
use super::summary::{Summary, reconcile};
use super::user::{SessionIdentity, UserId, UserRef};

mod enrichment;
mod merge;

pub use enrichment::{EnrichmentReport, EnrichmentTicket};

/// Port bundle required by the store.
pub struct ClaimStorePorts {
    /// Claims half of the upstream service.
    pub claims: Arc<dyn ClaimsGateway>,
    /// Users half of the upstream service.
    pub directory: Arc<dyn UserDirectory>,
}

impl ClaimStorePorts {
    /// Build a strongly-typed store port bundle.
    pub fn new(claims: Arc<dyn ClaimsGateway>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { claims, directory }
    }
}

/// Store tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Follow listing pages until the last one.
    pub fetch_all_pages: bool,
    /// Page size requested when following pages.
    pub page_size: u32,
    /// Upper bound on pages followed per listing.
    pub max_pages: u32,
    /// Concurrent direct user lookups.
    pub max_concurrent_lookups: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            fetch_all_pages: false,
            page_size: 50,
            max_pages: 200,
            max_concurrent_lookups: 8,
        }
    }
}

/// Resolution progress of one reference on one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionState {
    /// The reference is absent or still carries the placeholder name.
    Unresolved,
    /// A lookup for the reference is running.
    Resolving,
    /// The reference carries a real name.
    Resolved,
}

/// A claim stored by a mutation, and the enrichment it triggered.
#[derive(Debug)]
pub struct ClaimUpdate {
    /// The claim as stored.
    pub claim: Claim,
    /// Background enrichment for the claim's references.
    pub enrichment: EnrichmentTicket,
}

/// Limit figures for one user, as seen by finance and admin.
#[derive(Debug, Clone, PartialEq)]
pub struct UserLimit {
    /// The user.
    pub user: UserRef,
    /// Their limit usage.
    pub summary: Summary,
}

#[derive(Debug, Default)]
struct StoreState {
    claims: Vec<Claim>,
    summary: Summary,
    resolving: HashMap<UserId, usize>,
}

pub(crate) struct StoreInner {
    session: SessionIdentity,
    claims_port: Arc<dyn ClaimsGateway>,
    directory: Arc<dyn UserDirectory>,
    cache: Arc<EnrichmentCache>,
    resolver: RoleAwareResolver,
    settings: StoreSettings,
    state: Mutex<StoreState>,
}

/// Session-scoped claim collection and limit summary.
///
/// Cloning the store is cheap; clones share state.
#[derive(Clone)]
pub struct ClaimStore {
    inner: Arc<StoreInner>,
}

impl ClaimStore {
    /// Build an empty store acting for `session`.
    pub fn new(session: SessionIdentity, ports: ClaimStorePorts, settings: StoreSettings) -> Self {
        let cache = Arc::new(EnrichmentCache::new(
            ports.directory.clone(),
            settings.max_concurrent_lookups,
        ));
        cache.remember(session.as_user_ref());
        if let Some(manager_id) = &session.manager_id {
            cache.link_manager(session.id.clone(), manager_id.clone());
        }
        let resolver = RoleAwareResolver::new(
            session.clone(),
            cache.clone(),
            ports.directory.clone(),
            ports.claims.clone(),
        );

        Self {
            inner: Arc::new(StoreInner {
                session,
                claims_port: ports.claims,
                directory: ports.directory,
                cache,
                resolver,
                settings,
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    /// The identity this store acts for.
    pub fn session(&self) -> &SessionIdentity {
        &self.inner.session
    }

    /// The session's enrichment cache.
    pub fn cache(&self) -> &EnrichmentCache {
        &self.inner.cache
    }

    /// Fetch a claim listing and replace the collection with it.
    ///
    /// With page following enabled, every page must succeed before anything
    /// is stored.
    ///
    /// # Errors
    /// Returns the upstream failure of any page.
    pub async fn fetch_claims(
        &self,
        scope: ClaimScope,
        query: &ClaimListQuery,
    ) -> Result<EnrichmentTicket, Error> {
        let pages = self.fetch_pages(scope, query).await?;
        let own = scope == ClaimScope::Mine;

        let mut incoming = Vec::new();
        for page in &pages {
            for raw in &page.claims {
                let mut claim = normalize(raw);
                if claim.id.is_none() {
                    warn!(%scope, "dropping claim without an id");
                    continue;
                }
                self.inner.localise(&mut claim, own);
                incoming.push(claim);
            }
        }

        {
            let mut state = self.inner.state();
            for fragment in pages.iter().filter_map(|page| page.summary_fragment.as_ref()) {
                state.summary = reconcile(&state.summary, fragment);
            }
            merge::replace_all(&mut state.claims, incoming);
        }
        Ok(enrichment::spawn_pass(&self.inner))
    }

    async fn fetch_pages(
        &self,
        scope: ClaimScope,
        query: &ClaimListQuery,
    ) -> Result<Vec<RawClaimList>, Error> {
        let port = &self.inner.claims_port;
        let settings = self.inner.settings;
        if !settings.fetch_all_pages {
            return Ok(vec![port.fetch_claim_list(scope, query).await?]);
        }

        let page_size = query.limit.unwrap_or(settings.page_size).max(1);
        let base = ClaimListQuery {
            limit: Some(page_size),
            ..query.clone()
        };
        let max_pages = usize::try_from(settings.max_pages.max(1)).unwrap_or(usize::MAX);
        let mut page = query.page.unwrap_or(1).max(1);
        let mut pages = Vec::new();
        loop {
            let list = port.fetch_claim_list(scope, &base.for_page(page)).await?;
            let received = list.claims.len();
            let total_pages = list.total_pages;
            pages.push(list);

            let more = match total_pages {
                Some(total) => page < total,
                None => u32::try_from(received).is_ok_and(|received| received >= page_size),
            };
            if !more {
                break;
            }
            if pages.len() >= max_pages {
                warn!(%scope, max_pages, "stopped following claim pages at the page cap");
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(pages)
    }

    /// Create a draft claim.
    ///
    /// # Errors
    /// Returns the upstream failure, or an internal error when the service
    /// answers with a claim that carries no id.
    pub async fn create_claim(&self, draft: &ClaimDraft) -> Result<ClaimUpdate, Error> {
        let record = self.inner.claims_port.create_claim(draft).await?;
        self.store_record(&record, None, true)
    }

    /// Update a draft claim.
    ///
    /// # Errors
    /// Returns the upstream failure.
    pub async fn update_claim(&self, id: &ClaimId, patch: &ClaimPatch) -> Result<ClaimUpdate, Error> {
        let record = self.inner.claims_port.update_claim(id, patch).await?;
        self.store_record(&record, Some(id), true)
    }

    /// Submit a draft for approval, then refresh the summary.
    ///
    /// A failed summary refresh is logged and does not fail the submission.
    ///
    /// # Errors
    /// Returns the upstream failure of the submission.
    pub async fn submit_claim(&self, id: &ClaimId) -> Result<ClaimUpdate, Error> {
        let record = self.inner.claims_port.submit_claim(id).await?;
        let update = self.store_record(&record, Some(id), true)?;
        if let Err(error) = self.refresh_summary().await {
            warn!(claim_id = %id, %error, "summary refresh after submission failed");
        }
        Ok(update)
    }

    /// Approve a submitted claim.
    ///
    /// # Errors
    /// Returns the upstream failure.
    pub async fn approve_claim(&self, id: &ClaimId) -> Result<ClaimUpdate, Error> {
        self.transition(id, ClaimTransition::Approve).await
    }

    /// Reject a submitted claim.
    ///
    /// # Errors
    /// Returns the upstream failure.
    pub async fn reject_claim(&self, id: &ClaimId, reason: Option<String>) -> Result<ClaimUpdate, Error> {
        self.transition(id, ClaimTransition::Reject { reason }).await
    }

    /// Mark an approved claim as paid out.
    ///
    /// # Errors
    /// Returns the upstream failure.
    pub async fn reimburse_claim(&self, id: &ClaimId) -> Result<ClaimUpdate, Error> {
        self.transition(id, ClaimTransition::Reimburse).await
    }

    /// Reject an approved claim on behalf of finance.
    ///
    /// # Errors
    /// Returns the upstream failure.
    pub async fn finance_reject_claim(
        &self,
        id: &ClaimId,
        reason: Option<String>,
    ) -> Result<ClaimUpdate, Error> {
        self.transition(id, ClaimTransition::FinanceReject { reason })
            .await
    }

    async fn transition(&self, id: &ClaimId, transition: ClaimTransition) -> Result<ClaimUpdate, Error> {
        let record = self
            .inner
            .claims_port
            .transition_claim(id, &transition)
            .await?;
        self.store_record(&record, Some(id), false)
    }

    /// Delete a claim upstream and locally.
    ///
    /// # Errors
    /// Returns the upstream failure.
    pub async fn delete_claim(&self, id: &ClaimId) -> Result<(), Error> {
        self.inner.claims_port.delete_claim(id).await?;
        merge::remove(&mut self.inner.state().claims, id);
        Ok(())
    }

    /// Re-read the caller's limit figures.
    ///
    /// # Errors
    /// Returns the upstream failure.
    pub async fn refresh_summary(&self) -> Result<Summary, Error> {
        let raw = self
            .inner
            .directory
            .fetch_user_summary(&self.inner.session.id)
            .await?;
        let mut state = self.inner.state();
        state.summary = reconcile(&state.summary, &raw);
        Ok(state.summary)
    }

    /// Limit figures for every user.
    ///
    /// Only finance and admin may read these; other roles fail without a
    /// request. Users seen here are cached for later enrichment.
    ///
    /// # Errors
    /// Returns [`crate::domain::ErrorCode::Forbidden`] for other roles, or
    /// the upstream failure.
    pub async fn team_limits(&self) -> Result<Vec<UserLimit>, Error> {
        if !self.inner.session.role.is_elevated() {
            return Err(Error::forbidden(format!(
                "role {} may not read other users' claim limits",
                self.inner.session.role
            )));
        }

        let records = self.inner.directory.fetch_summary_list().await?;
        let limits = records
            .iter()
            .filter_map(|raw| {
                let record = normalize_user(raw)?;
                let summary = reconcile(&Summary::default(), raw);
                let user = record.user.clone();
                self.inner.cache.remember_directory_user(record);
                Some(UserLimit { user, summary })
            })
            .collect();
        Ok(limits)
    }

    /// Run an enrichment pass now and wait for it.
    pub async fn enrich(&self) -> EnrichmentReport {
        enrichment::spawn_pass(&self.inner).wait().await
    }

    /// Forget the session's claims, summary and cached users.
    pub fn end_session(&self) {
        self.inner.cache.clear();
        let mut state = self.inner.state();
        state.claims.clear();
        state.summary = Summary::default();
    }

    /// Every stored claim, in listing order with local additions appended.
    pub fn claims(&self) -> Vec<Claim> {
        self.inner.snapshot()
    }

    /// The stored claim with `id`.
    pub fn claim(&self, id: &ClaimId) -> Option<Claim> {
        self.inner
            .state()
            .claims
            .iter()
            .find(|claim| claim.id.as_ref() == Some(id))
            .cloned()
    }

    /// Stored claims still in draft.
    pub fn drafts(&self) -> Vec<Claim> {
        self.filtered(|claim| claim.status == ClaimStatus::Draft)
    }

    /// Stored claims past draft.
    pub fn non_drafts(&self) -> Vec<Claim> {
        self.filtered(|claim| claim.status != ClaimStatus::Draft)
    }

    /// Current limit summary.
    pub fn summary(&self) -> Summary {
        self.inner.state().summary
    }

    /// Resolution progress of `field` on the claim with `id`.
    pub fn resolution_state(&self, id: &ClaimId, field: ClaimField) -> ResolutionState {
        let state = self.inner.state();
        let Some(user) = state
            .claims
            .iter()
            .find(|claim| claim.id.as_ref() == Some(id))
            .and_then(|claim| claim.user(field))
        else {
            return ResolutionState::Unresolved;
        };

        if user.is_resolved() {
            ResolutionState::Resolved
        } else if state.resolving.contains_key(&user.id) || self.inner.cache.is_in_flight(&user.id) {
            ResolutionState::Resolving
        } else {
            ResolutionState::Unresolved
        }
    }

    fn filtered(&self, keep: impl Fn(&Claim) -> bool) -> Vec<Claim> {
        self.inner
            .state()
            .claims
            .iter()
            .filter(|claim| keep(*claim))
            .cloned()
            .collect()
    }

    fn store_record(
        &self,
        record: &RawClaimRecord,
        requested: Option<&ClaimId>,
        own: bool,
    ) -> Result<ClaimUpdate, Error> {
        let mut claim = normalize(&record.claim);
        if claim.id.is_none() {
            claim.id = requested.cloned();
        }
        if claim.id.is_none() {
            return Err(GatewayError::decode("service returned a claim without an id").into());
        }
        self.inner.localise(&mut claim, own);

        let stored = {
            let mut state = self.inner.state();
            if let Some(fragment) = &record.summary_fragment {
                state.summary = reconcile(&state.summary, fragment);
            }
            merge::upsert(&mut state.claims, claim)
        };
        Ok(ClaimUpdate {
            claim: stored,
            enrichment: enrichment::spawn_pass(&self.inner),
        })
    }
}

impl StoreInner {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Vec<Claim> {
        self.state().claims.clone()
    }

    /// Fill in what is known without a request.
    ///
    /// `own` marks claims the caller created: a missing creator becomes the
    /// caller.
    fn localise(&self, claim: &mut Claim, own: bool) {
        let me = self.session.as_user_ref();
        if own && claim.created_by.is_none() {
            claim.created_by = Some(me.clone());
        }
        merge::apply_to_claim(claim, &me);

        // Applies to every scope: a learned link fills an absent manager.
        if claim.manager.is_none() {
            let manager = claim
                .created_by
                .as_ref()
                .and_then(|creator| self.cache.manager_of(&creator.id));
            claim.manager = manager.map(UserRef::placeholder);
        }

        let cached: Vec<UserRef> = [ClaimField::CreatedBy, ClaimField::Manager]
            .into_iter()
            .filter_map(|field| claim.user(field))
            .filter(|user| !user.is_resolved())
            .filter_map(|user| self.cache.get(&user.id))
            .collect();
        for user in &cached {
            merge::apply_to_claim(claim, user);
        }
    }

    /// Re-apply local knowledge to every stored claim.
    fn apply_local_knowledge(&self) {
        let mut state = self.state();
        for claim in &mut state.claims {
            self.localise(claim, false);
        }
    }

    /// Write `user` into every matching reference.
    fn apply_user(&self, user: &UserRef) {
        let mut state = self.state();
        for claim in &mut state.claims {
            merge::apply_to_claim(claim, user);
        }
    }

    fn mark_resolving(&self, id: &UserId) -> Resolving<'_> {
        *self.state().resolving.entry(id.clone()).or_default() += 1;
        Resolving {
            inner: self,
            id: id.clone(),
        }
    }
}

/// Marks a user id as being resolved until dropped.
struct Resolving<'a> {
    inner: &'a StoreInner,
    id: UserId,
}

impl Drop for Resolving<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.state();
        if let Some(count) = state.resolving.get_mut(&self.id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.resolving.remove(&self.id);
            }
        }
    }
}

//! Background enrichment passes over the stored claims.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::StoreInner;
use crate::domain::claim::ClaimField;
use crate::domain::resolver::{EnrichmentPass, Relationship, decide};
use crate::domain::user::UserId;

/// Outcome of one enrichment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Correlation id of the pass.
    pub pass_id: Uuid,
    /// Distinct user ids the pass tried to resolve.
    pub attempted: usize,
    /// Ids resolved to a real name.
    pub resolved: usize,
    /// Ids left on the placeholder name.
    pub unresolved: usize,
}

impl EnrichmentReport {
    fn empty(pass_id: Uuid) -> Self {
        Self {
            pass_id,
            attempted: 0,
            resolved: 0,
            unresolved: 0,
        }
    }
}

/// Handle to a pass running in the background.
///
/// Dropping the ticket does not cancel the pass.
#[derive(Debug)]
pub struct EnrichmentTicket {
    pass_id: Uuid,
    handle: Option<JoinHandle<EnrichmentReport>>,
}

impl EnrichmentTicket {
    /// Correlation id of the pass.
    pub fn pass_id(&self) -> Uuid {
        self.pass_id
    }

    /// Whether the pass has nothing left to do.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the pass to finish and return its report.
    pub async fn wait(self) -> EnrichmentReport {
        let Some(handle) = self.handle else {
            return EnrichmentReport::empty(self.pass_id);
        };
        handle.await.unwrap_or_else(|error| {
            warn!(pass_id = %self.pass_id, %error, "enrichment pass aborted");
            EnrichmentReport::empty(self.pass_id)
        })
    }
}

/// Start a pass over whatever is unresolved right now.
pub(super) fn spawn_pass(inner: &Arc<StoreInner>) -> EnrichmentTicket {
    let pass = EnrichmentPass::new();
    let pass_id = pass.id();
    if pending_targets(inner).is_empty() {
        return EnrichmentTicket {
            pass_id,
            handle: None,
        };
    }

    let span = info_span!("enrichment_pass", pass_id = %pass_id);
    let handle = tokio::spawn(run_pass(Arc::clone(inner), pass).instrument(span));
    EnrichmentTicket {
        pass_id,
        handle: Some(handle),
    }
}

async fn run_pass(inner: Arc<StoreInner>, pass: EnrichmentPass) -> EnrichmentReport {
    let mut report = EnrichmentReport::empty(pass.id());
    let mut attempted: HashSet<UserId> = HashSet::new();

    // A second round picks up manager placeholders derived from links the
    // first round learned.
    for _round in 0..2 {
        let targets: Vec<(UserId, Vec<Relationship>)> = pending_targets(&inner)
            .into_iter()
            .filter(|(id, _)| !attempted.contains(id))
            .collect();
        if targets.is_empty() {
            break;
        }
        attempted.extend(targets.iter().map(|(id, _)| id.clone()));

        let outcomes = join_all(
            targets
                .iter()
                .map(|(id, relationships)| resolve_target(&inner, id, relationships, &pass)),
        )
        .await;

        report.attempted += outcomes.len();
        report.resolved += outcomes.iter().filter(|resolved| **resolved).count();
        inner.apply_local_knowledge();
    }

    report.unresolved = report.attempted.saturating_sub(report.resolved);
    info!(
        attempted = report.attempted,
        resolved = report.resolved,
        unresolved = report.unresolved,
        "enrichment pass finished"
    );
    report
}

async fn resolve_target(
    inner: &StoreInner,
    id: &UserId,
    relationships: &[Relationship],
    pass: &EnrichmentPass,
) -> bool {
    let _resolving = inner.mark_resolving(id);
    let mut tried = HashSet::new();

    for relationship in relationships {
        let strategy = decide(
            inner.resolver.caller(),
            id,
            relationship,
            inner.cache.is_forbidden(id),
        );
        if !tried.insert(strategy) {
            continue;
        }
        let Some(user) = inner.resolver.resolve(id, relationship, pass).await else {
            continue;
        };
        if user.is_resolved() {
            inner.cache.remember(user.clone());
            inner.apply_user(&user);
            debug!(user_id = %id, "user reference resolved");
            return true;
        }
    }

    debug!(user_id = %id, "user reference left unresolved");
    false
}

/// Unresolved references in the collection, grouped by user id.
fn pending_targets(inner: &StoreInner) -> HashMap<UserId, Vec<Relationship>> {
    let mut targets: HashMap<UserId, Vec<Relationship>> = HashMap::new();
    for claim in inner.snapshot() {
        for field in [ClaimField::CreatedBy, ClaimField::Manager] {
            let Some(user) = claim.user(field).filter(|user| !user.is_resolved()) else {
                continue;
            };
            let relationships = targets.entry(user.id.clone()).or_default();
            let relationship = Relationship::for_claim(&claim, field);
            if !relationships.contains(&relationship) {
                relationships.push(relationship);
            }
        }
    }
    targets
}

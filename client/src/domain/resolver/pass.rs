//! Per-pass memoisation of batch and delegate fetches.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::domain::claim::ClaimId;
use crate::domain::user::UserId;

type Cells<K> = Mutex<HashMap<K, Arc<OnceCell<()>>>>;

/// One enrichment pass.
///
/// Every batch or delegate fetch runs at most once per pass, however many
/// references ask for it; concurrent askers wait for the first fetch.
#[derive(Debug, Default)]
pub struct EnrichmentPass {
    id: Uuid,
    managers: OnceCell<()>,
    manager_of: Cells<UserId>,
    claim_details: Cells<ClaimId>,
}

impl EnrichmentPass {
    /// Start a new pass with a fresh correlation id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            ..Self::default()
        }
    }

    /// Correlation id used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) async fn once_managers<F, Fut>(&self, load: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.managers.get_or_init(load).await;
    }

    pub(crate) async fn once_manager_of<F, Fut>(&self, employee: &UserId, load: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        cell(&self.manager_of, employee).get_or_init(load).await;
    }

    pub(crate) async fn once_claim_detail<F, Fut>(&self, claim: &ClaimId, load: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        cell(&self.claim_details, claim).get_or_init(load).await;
    }
}

fn cell<K>(cells: &Cells<K>, key: &K) -> Arc<OnceCell<()>>
where
    K: Eq + Hash + Clone,
{
    cells
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key.clone())
        .or_default()
        .clone()
}

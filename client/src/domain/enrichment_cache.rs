//! Session-scoped cache of resolved users and denied lookups.
//!
//! The cache is the only component that issues direct user lookups. It
//! guarantees that a resolved id is never fetched again, that an id the
//! upstream denied is never fetched again, and that concurrent lookups of one
//! id share a single request. A lookup that succeeded without a usable name
//! is not repeated either.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;
use tracing::debug;

use super::error::Error;
use super::normalizer::normalize_user;
use super::ports::{FailureKind, UserDirectory};
use super::user::{DirectoryUser, UserId, UserRef};

#[derive(Debug, Default)]
struct CacheState {
    resolved: HashMap<UserId, UserRef>,
    forbidden: HashSet<UserId>,
    nameless: HashSet<UserId>,
    manager_links: HashMap<UserId, UserId>,
    in_flight: HashMap<UserId, Arc<tokio::sync::Mutex<()>>>,
}

enum Local {
    Resolved(UserRef),
    Nameless,
    Forbidden,
    Unknown,
}

/// Resolved users, denied ids and learned manager links for one session.
pub struct EnrichmentCache {
    directory: Arc<dyn UserDirectory>,
    lookups: Semaphore,
    state: Mutex<CacheState>,
}

impl EnrichmentCache {
    /// Build an empty cache issuing at most `max_concurrent_lookups` direct
    /// lookups at once.
    pub fn new(directory: Arc<dyn UserDirectory>, max_concurrent_lookups: usize) -> Self {
        Self {
            directory,
            lookups: Semaphore::new(max_concurrent_lookups.max(1)),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Resolve `id` to a user reference.
    ///
    /// Blank ids fail before any I/O. Cached users are returned without a
    /// request and denied ids yield `None` without one. Otherwise the
    /// directory is asked once; concurrent callers share that request.
    ///
    /// # Errors
    /// Returns [`crate::domain::ErrorCode::InvalidRequest`] for a blank or
    /// untrimmed id. Lookup failures are never errors.
    pub async fn resolve(&self, id: &str) -> Result<Option<UserRef>, Error> {
        let id = UserId::new(id)?;
        Ok(self.resolve_id(&id).await)
    }

    /// Resolve an already-validated id. See [`EnrichmentCache::resolve`].
    pub async fn resolve_id(&self, id: &UserId) -> Option<UserRef> {
        match self.lookup_local(id) {
            Local::Resolved(user) => return Some(user),
            Local::Nameless => return Some(UserRef::placeholder(id.clone())),
            Local::Forbidden => return None,
            Local::Unknown => {}
        }

        let gate = InFlight::enter(self, id);
        let _turn = gate.gate.lock().await;
        match self.lookup_local(id) {
            Local::Resolved(user) => Some(user),
            Local::Nameless => Some(UserRef::placeholder(id.clone())),
            Local::Forbidden => None,
            Local::Unknown => self.fetch(id).await,
        }
    }

    async fn fetch(&self, id: &UserId) -> Option<UserRef> {
        let Ok(_permit) = self.lookups.acquire().await else {
            debug!(user_id = %id, "lookup semaphore closed");
            return None;
        };

        match self.directory.fetch_user(id).await {
            Ok(raw) => {
                let Some(record) = normalize_user(&raw) else {
                    debug!(user_id = %id, "directory returned a user record without an id");
                    return None;
                };
                let user = record.user.clone();
                self.remember_directory_user(record);
                if user.id == *id && !user.is_resolved() {
                    self.state().nameless.insert(id.clone());
                }
                debug!(user_id = %id, resolved = user.is_resolved(), "user lookup succeeded");
                (user.id == *id).then_some(user)
            }
            Err(error) if error.kind() == FailureKind::Forbidden => {
                self.state().forbidden.insert(id.clone());
                debug!(user_id = %id, %error, "user lookup denied; id marked forbidden");
                None
            }
            Err(error) => {
                debug!(user_id = %id, %error, "user lookup failed");
                None
            }
        }
    }

    /// Cache `user` if it carries a resolved name.
    ///
    /// A placeholder never replaces a cached name. An email already known is
    /// kept when `user` carries none. Returns whether the cache changed.
    pub fn remember(&self, user: UserRef) -> bool {
        if !user.is_resolved() {
            return false;
        }
        let mut state = self.state();
        let merged = match state.resolved.get(&user.id) {
            Some(existing) => UserRef {
                email: user.email.clone().or_else(|| existing.email.clone()),
                ..user
            },
            None => user,
        };
        let changed = state.resolved.get(&merged.id) != Some(&merged);
        state.resolved.insert(merged.id.clone(), merged);
        changed
    }

    /// Cache a fetched directory record together with its manager link.
    pub fn remember_directory_user(&self, record: DirectoryUser) -> bool {
        if let Some(manager_id) = record.manager_id {
            self.state()
                .manager_links
                .insert(record.user.id.clone(), manager_id);
        }
        self.remember(record.user)
    }

    /// Record that `manager` manages `employee`.
    pub fn link_manager(&self, employee: UserId, manager: UserId) {
        self.state().manager_links.insert(employee, manager);
    }

    /// The manager of `employee`, if a fetched record named one.
    pub fn manager_of(&self, employee: &UserId) -> Option<UserId> {
        self.state().manager_links.get(employee).cloned()
    }

    /// The cached reference for `id`, if resolved.
    pub fn get(&self, id: &UserId) -> Option<UserRef> {
        self.state().resolved.get(id).cloned()
    }

    /// Whether the upstream denied a direct lookup of `id`.
    pub fn is_forbidden(&self, id: &UserId) -> bool {
        self.state().forbidden.contains(id)
    }

    /// Whether a direct lookup of `id` is running or queued.
    pub fn is_in_flight(&self, id: &UserId) -> bool {
        self.state().in_flight.contains_key(id)
    }

    /// Forget everything. Called when the session ends.
    pub fn clear(&self) {
        let mut state = self.state();
        state.resolved.clear();
        state.forbidden.clear();
        state.nameless.clear();
        state.manager_links.clear();
    }

    fn lookup_local(&self, id: &UserId) -> Local {
        let state = self.state();
        if let Some(user) = state.resolved.get(id) {
            return Local::Resolved(user.clone());
        }
        if state.forbidden.contains(id) {
            return Local::Forbidden;
        }
        if state.nameless.contains(id) {
            return Local::Nameless;
        }
        Local::Unknown
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration of one caller waiting on or running a lookup of `id`.
///
/// The per-id gate is dropped from the in-flight map when its last holder
/// leaves, including when the lookup future is cancelled.
struct InFlight<'a> {
    cache: &'a EnrichmentCache,
    id: UserId,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn enter(cache: &'a EnrichmentCache, id: &UserId) -> Self {
        let gate = cache
            .state()
            .in_flight
            .entry(id.clone())
            .or_default()
            .clone();
        Self {
            cache,
            id: id.clone(),
            gate,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.state();
        let last_holder = state
            .in_flight
            .get(&self.id)
            .is_some_and(|current| Arc::ptr_eq(current, &self.gate) && Arc::strong_count(current) <= 2);
        if last_holder {
            state.in_flight.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests;

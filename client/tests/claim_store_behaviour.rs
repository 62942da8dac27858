//! End-to-end behaviour of the claim store against scripted upstream stubs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use claims_client::domain::ports::{
    ClaimListQuery, ClaimScope, ClaimsGateway, FixtureClaimsGateway, GatewayError, RawClaimList,
    RawClaimRecord, UserDirectory,
};
use claims_client::domain::{
    ClaimDraft, ClaimField, ClaimId, ClaimPatch, ClaimStore, ClaimStorePorts, ClaimTransition,
    ResolutionState, Role, SessionIdentity, StoreSettings, Summary, UNKNOWN_NAME, UserId,
};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tokio::sync::Notify;

/// Serves queued listings in order, repeating the last one.
struct ListingStub {
    listings: Mutex<VecDeque<RawClaimList>>,
}

impl ListingStub {
    fn new(listings: impl IntoIterator<Item = RawClaimList>) -> Self {
        Self {
            listings: Mutex::new(listings.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ClaimsGateway for ListingStub {
    async fn fetch_claim_list(
        &self,
        _scope: ClaimScope,
        _query: &ClaimListQuery,
    ) -> Result<RawClaimList, GatewayError> {
        let mut listings = self.listings.lock().expect("listing lock");
        let next = if listings.len() > 1 {
            listings.pop_front()
        } else {
            listings.front().cloned()
        };
        Ok(next.unwrap_or_default())
    }

    async fn fetch_claim_detail(&self, id: &ClaimId) -> Result<Value, GatewayError> {
        FixtureClaimsGateway.fetch_claim_detail(id).await
    }

    async fn create_claim(&self, draft: &ClaimDraft) -> Result<RawClaimRecord, GatewayError> {
        FixtureClaimsGateway.create_claim(draft).await
    }

    async fn update_claim(
        &self,
        id: &ClaimId,
        patch: &ClaimPatch,
    ) -> Result<RawClaimRecord, GatewayError> {
        FixtureClaimsGateway.update_claim(id, patch).await
    }

    async fn submit_claim(&self, id: &ClaimId) -> Result<RawClaimRecord, GatewayError> {
        FixtureClaimsGateway.submit_claim(id).await
    }

    async fn transition_claim(
        &self,
        id: &ClaimId,
        transition: &ClaimTransition,
    ) -> Result<RawClaimRecord, GatewayError> {
        FixtureClaimsGateway.transition_claim(id, transition).await
    }

    async fn delete_claim(&self, id: &ClaimId) -> Result<(), GatewayError> {
        FixtureClaimsGateway.delete_claim(id).await
    }
}

/// How the directory answers direct user lookups.
enum UserAnswer {
    Found(&'static str),
    Forbidden,
}

/// Directory with call counters and an optional gate on direct lookups.
struct DirectoryStub {
    answer: UserAnswer,
    managers: Vec<Value>,
    gate: Option<Arc<Notify>>,
    user_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl DirectoryStub {
    fn new(answer: UserAnswer) -> Self {
        Self {
            answer,
            managers: Vec::new(),
            gate: None,
            user_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    fn with_managers(mut self, managers: Vec<Value>) -> Self {
        self.managers = managers;
        self
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for DirectoryStub {
    async fn fetch_user(&self, id: &UserId) -> Result<Value, GatewayError> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.answer {
            UserAnswer::Found(name) => Ok(json!({ "_id": id.as_ref(), "name": name })),
            UserAnswer::Forbidden => Err(GatewayError::forbidden(format!("user {id}"))),
        }
    }

    async fn fetch_manager_of(&self, _employee: &UserId) -> Result<Option<Value>, GatewayError> {
        Ok(None)
    }

    async fn fetch_managers_batch(&self) -> Result<Vec<Value>, GatewayError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.managers.clone())
    }

    async fn fetch_user_summary(&self, _user: &UserId) -> Result<Value, GatewayError> {
        Ok(json!({}))
    }

    async fn fetch_summary_list(&self) -> Result<Vec<Value>, GatewayError> {
        Ok(Vec::new())
    }
}

fn uid(raw: &str) -> UserId {
    UserId::new(raw).expect("valid user id")
}

fn cid(raw: &str) -> ClaimId {
    ClaimId::new(raw).expect("valid claim id")
}

fn listing(claims: Vec<Value>) -> RawClaimList {
    RawClaimList {
        claims,
        summary_fragment: None,
        total_pages: None,
    }
}

fn store(
    role: Role,
    claims: ListingStub,
    directory: &Arc<DirectoryStub>,
) -> ClaimStore {
    let directory: Arc<dyn UserDirectory> = directory.clone();
    ClaimStore::new(
        SessionIdentity::new(uid("me"), role).with_name("Me"),
        ClaimStorePorts::new(Arc::new(claims), directory),
        StoreSettings::default(),
    )
}

fn creator_name(store: &ClaimStore, id: &str) -> Option<String> {
    store
        .claim(&cid(id))
        .and_then(|claim| claim.created_by)
        .map(|user| user.name)
}

#[fixture]
fn finance_claim() -> Value {
    json!({ "_id": "c1", "title": "Taxi", "amount": "42.50", "createdBy": "u1" })
}

#[tokio::test]
async fn manager_leaves_unrelated_creator_unresolved_without_direct_lookup() {
    let directory = Arc::new(
        DirectoryStub::new(UserAnswer::Found("Should not be used"))
            .with_managers(vec![json!({ "_id": "m2", "name": "Alice", "role": "manager" })]),
    );
    let claims = ListingStub::new([listing(vec![json!({
        "_id": "c1",
        "createdBy": "u9",
        "manager": { "id": "m2" }
    })])]);
    let store = store(Role::Manager, claims, &directory);

    let ticket = store
        .fetch_claims(ClaimScope::Team, &ClaimListQuery::default())
        .await
        .expect("listing should load");
    let report = ticket.wait().await;

    let claim = store.claim(&cid("c1")).expect("claim stored");
    assert_eq!(directory.user_calls(), 0);
    assert_eq!(claim.created_by.map(|user| user.name), Some(UNKNOWN_NAME.to_owned()));
    assert_eq!(claim.manager.map(|user| user.name), Some("Alice".to_owned()));
    assert_eq!(report.resolved, 1);
    assert_eq!(report.unresolved, 1);
    assert!(!store.cache().is_forbidden(&uid("u9")));
}

#[rstest]
#[tokio::test]
async fn concurrent_passes_fetch_a_user_once(finance_claim: Value) {
    let gate = Arc::new(Notify::new());
    let directory = Arc::new(DirectoryStub::new(UserAnswer::Found("Ada")).gated(gate.clone()));
    let store = store(
        Role::Finance,
        ListingStub::new([listing(vec![finance_claim])]),
        &directory,
    );

    let first = store
        .fetch_claims(ClaimScope::Finance, &ClaimListQuery::default())
        .await
        .expect("listing should load");
    let second = tokio::spawn({
        let store = store.clone();
        async move { store.enrich().await }
    });

    while directory.user_calls() == 0 {
        tokio::task::yield_now().await;
    }
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
    assert_eq!(
        store.resolution_state(&cid("c1"), ClaimField::CreatedBy),
        ResolutionState::Resolving
    );
    gate.notify_one();

    first.wait().await;
    second.await.expect("second pass should finish");

    assert_eq!(directory.user_calls(), 1);
    assert_eq!(creator_name(&store, "c1"), Some("Ada".to_owned()));
    assert_eq!(
        store.resolution_state(&cid("c1"), ClaimField::CreatedBy),
        ResolutionState::Resolved
    );
}

#[rstest]
#[tokio::test]
async fn forbidden_user_is_never_requested_again(finance_claim: Value) {
    let directory = Arc::new(DirectoryStub::new(UserAnswer::Forbidden));
    let store = store(
        Role::Finance,
        ListingStub::new([listing(vec![finance_claim])]),
        &directory,
    );

    store
        .fetch_claims(ClaimScope::Finance, &ClaimListQuery::default())
        .await
        .expect("listing should load")
        .wait()
        .await;
    store.enrich().await;
    store
        .fetch_claims(ClaimScope::Finance, &ClaimListQuery::default())
        .await
        .expect("listing should load")
        .wait()
        .await;

    assert_eq!(directory.user_calls(), 1);
    assert!(store.cache().is_forbidden(&uid("u1")));
    assert_eq!(creator_name(&store, "c1"), Some(UNKNOWN_NAME.to_owned()));
}

#[tokio::test]
async fn refetching_never_downgrades_a_resolved_name() {
    let directory = Arc::new(DirectoryStub::new(UserAnswer::Forbidden));
    let claims = ListingStub::new([
        listing(vec![json!({ "_id": "c1", "createdBy": { "_id": "u1", "name": "Ada" } })]),
        listing(vec![json!({ "_id": "c1", "createdBy": "u1", "status": "submitted" })]),
    ]);
    let store = store(Role::Finance, claims, &directory);

    for _ in 0..2 {
        store
            .fetch_claims(ClaimScope::Finance, &ClaimListQuery::default())
            .await
            .expect("listing should load")
            .wait()
            .await;
    }

    assert_eq!(directory.user_calls(), 0);
    assert_eq!(creator_name(&store, "c1"), Some("Ada".to_owned()));
    assert_eq!(store.non_drafts().len(), 1);
}

#[tokio::test]
async fn listing_summary_derives_the_missing_figure() {
    let directory = Arc::new(DirectoryStub::new(UserAnswer::Found("Ada")));
    let claims = ListingStub::new([RawClaimList {
        claims: Vec::new(),
        summary_fragment: Some(json!({ "limit": { "total": 1000 }, "used": 400 })),
        total_pages: None,
    }]);
    let store = store(Role::Employee, claims, &directory);

    store
        .fetch_claims(ClaimScope::Mine, &ClaimListQuery::default())
        .await
        .expect("listing should load");

    assert_eq!(store.summary(), Summary::new(1000.0, 400.0, 600.0));
}

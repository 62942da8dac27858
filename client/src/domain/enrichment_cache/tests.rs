//! Unit tests for the session enrichment cache.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rstest::rstest;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::ports::GatewayError;
use crate::domain::user::UNKNOWN_NAME;

type Script = VecDeque<Result<Value, GatewayError>>;

#[derive(Default)]
struct DirectoryStub {
    scripted: Mutex<HashMap<String, Script>>,
    calls: AtomicUsize,
    entered: Option<mpsc::UnboundedSender<String>>,
    release: Option<Arc<Notify>>,
}

impl DirectoryStub {
    fn scripted(entries: Vec<(&str, Result<Value, GatewayError>)>) -> Self {
        let mut scripted: HashMap<String, Script> = HashMap::new();
        for (id, result) in entries {
            scripted.entry(id.to_owned()).or_default().push_back(result);
        }
        Self {
            scripted: Mutex::new(scripted),
            ..Self::default()
        }
    }

    fn blocking(
        entries: Vec<(&str, Result<Value, GatewayError>)>,
        entered: mpsc::UnboundedSender<String>,
        release: Arc<Notify>,
    ) -> Self {
        Self {
            entered: Some(entered),
            release: Some(release),
            ..Self::scripted(entries)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for DirectoryStub {
    async fn fetch_user(&self, id: &UserId) -> Result<Value, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(entered) = &self.entered {
            entered.send(id.to_string()).expect("send entry");
        }
        if let Some(release) = &self.release {
            release.notified().await;
        }
        self.scripted
            .lock()
            .expect("directory mutex")
            .get_mut(id.as_ref())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(GatewayError::not_found(id.to_string())))
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

fn id(raw: &str) -> UserId {
    UserId::new(raw).expect("valid id")
}

fn cache_over(directory: &Arc<DirectoryStub>) -> EnrichmentCache {
    EnrichmentCache::new(directory.clone(), 4)
}

#[rstest]
#[case::empty("")]
#[case::blank("   ")]
#[tokio::test]
async fn blank_ids_fail_before_any_lookup(#[case] raw: &str) {
    let directory = Arc::new(DirectoryStub::default());
    let cache = cache_over(&directory);

    let err = cache.resolve(raw).await.expect_err("validation error");

    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(directory.calls(), 0);
}

#[tokio::test]
async fn resolved_users_are_fetched_once() {
    let directory = Arc::new(DirectoryStub::scripted(vec![(
        "u1",
        Ok(json!({ "_id": "u1", "name": "Ada", "manager": "m1" })),
    )]));
    let cache = cache_over(&directory);

    let first = cache.resolve("u1").await.expect("valid id");
    let second = cache.resolve("u1").await.expect("valid id");

    assert_eq!(first.map(|user| user.name), Some("Ada".to_owned()));
    assert_eq!(second.map(|user| user.name), Some("Ada".to_owned()));
    assert_eq!(directory.calls(), 1);
    assert_eq!(cache.manager_of(&id("u1")), Some(id("m1")));
}

#[tokio::test]
async fn forbidden_ids_are_never_fetched_again() {
    let directory = Arc::new(DirectoryStub::scripted(vec![(
        "u2",
        Err(GatewayError::forbidden("not your report")),
    )]));
    let cache = cache_over(&directory);

    assert_eq!(cache.resolve("u2").await.expect("valid id"), None);
    assert_eq!(cache.resolve("u2").await.expect("valid id"), None);

    assert!(cache.is_forbidden(&id("u2")));
    assert_eq!(directory.calls(), 1);
}

#[tokio::test]
async fn nameless_records_are_not_looked_up_again() {
    let directory = Arc::new(DirectoryStub::scripted(vec![
        ("u4", Ok(json!({ "_id": "u4" }))),
        ("u4", Ok(json!({ "_id": "u4", "name": "Late" }))),
    ]));
    let cache = cache_over(&directory);

    let first = cache.resolve("u4").await.expect("valid id");
    let second = cache.resolve("u4").await.expect("valid id");

    assert_eq!(first, Some(UserRef::placeholder(id("u4"))));
    assert_eq!(second, first);
    assert_eq!(directory.calls(), 1);

    assert!(cache.remember(UserRef::new(id("u4"), "Ada", None)));
    let learned = cache.resolve("u4").await.expect("valid id");
    assert_eq!(learned.map(|user| user.name), Some("Ada".to_owned()));
    assert_eq!(directory.calls(), 1);
}

#[rstest]
#[case::not_found(GatewayError::not_found("u3"))]
#[case::transient(GatewayError::timeout("slow"))]
#[tokio::test]
async fn other_failures_stay_eligible_for_retry(#[case] failure: GatewayError) {
    let directory = Arc::new(DirectoryStub::scripted(vec![
        ("u3", Err(failure)),
        ("u3", Ok(json!({ "_id": "u3", "name": "Grace" }))),
    ]));
    let cache = cache_over(&directory);

    assert_eq!(cache.resolve("u3").await.expect("valid id"), None);
    assert!(!cache.is_forbidden(&id("u3")));

    let retried = cache.resolve("u3").await.expect("valid id");
    assert_eq!(retried.map(|user| user.name), Some("Grace".to_owned()));
    assert_eq!(directory.calls(), 2);
}

#[tokio::test]
async fn concurrent_lookups_share_one_request() {
    let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
    let release = Arc::new(Notify::new());
    let directory = Arc::new(DirectoryStub::blocking(
        vec![("u1", Ok(json!({ "_id": "u1", "name": "Ada" })))],
        entered_tx,
        release.clone(),
    ));
    let cache = Arc::new(cache_over(&directory));

    let first = tokio::spawn({
        let cache = cache.clone();
        async move { cache.resolve("u1").await }
    });
    assert_eq!(entered_rx.recv().await.as_deref(), Some("u1"));
    assert!(cache.is_in_flight(&id("u1")));

    let second = tokio::spawn({
        let cache = cache.clone();
        async move { cache.resolve("u1").await }
    });
    tokio::task::yield_now().await;
    release.notify_one();

    let first = first.await.expect("join").expect("valid id");
    let second = second.await.expect("join").expect("valid id");

    assert_eq!(first, second);
    assert_eq!(directory.calls(), 1);
    assert!(!cache.is_in_flight(&id("u1")));
}

#[test]
fn remember_never_downgrades_a_resolved_name() {
    let directory = Arc::new(DirectoryStub::default());
    let cache = cache_over(&directory);
    let resolved = UserRef::new(id("u1"), "Ada", Some("ada@x.test".to_owned()));

    assert!(cache.remember(resolved.clone()));
    assert!(!cache.remember(UserRef::new(id("u1"), UNKNOWN_NAME, None)));
    assert!(!cache.remember(UserRef::new(id("u1"), "Ada", None)));

    assert_eq!(cache.get(&id("u1")), Some(resolved));
}

#[test]
fn clear_forgets_the_session() {
    let directory = Arc::new(DirectoryStub::default());
    let cache = cache_over(&directory);
    cache.remember_directory_user(DirectoryUser {
        user: UserRef::new(id("u1"), "Ada", None),
        role: None,
        manager_id: Some(id("m1")),
    });

    cache.clear();

    assert_eq!(cache.get(&id("u1")), None);
    assert_eq!(cache.manager_of(&id("u1")), None);
}

//! Retry behaviour of the anonymization engine against the in-memory store

use anonymous::adapters::database::{RecordStore, StoreTransaction};
use anonymous::adapters::memory::MemoryStore;
use anonymous::anonymization::{AnonymizationConfig, AnonymizationEngine, Anonymizable, Record, RuleSet};
use anonymous::domain::{AnonymousError, Attributes, RecordId, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use test_case::test_case;

fn user(id: &str, email: &str) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("id".to_string(), json!(id));
    attrs.insert("email".to_string(), json!(email));
    attrs.insert("nickname".to_string(), json!(format!("nick-{id}")));
    attrs.insert("plan".to_string(), json!("pro"));
    attrs
}

/// Store with the record under test ("1") and `taken` rows holding `taken-N@example.invalid`
fn store_with_taken(taken: usize) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.create_table("users", &["email"]).unwrap();
    store
        .insert("users", RecordId::new("1").unwrap(), user("1", "jane@example.com"))
        .unwrap();
    for n in 0..taken {
        let id = format!("taken-{n}");
        store
            .insert(
                "users",
                RecordId::new(id.as_str()).unwrap(),
                user(&id, &format!("taken-{n}@example.invalid")),
            )
            .unwrap();
    }
    store
}

fn load(store: &MemoryStore, id: &str) -> Record {
    let id = RecordId::new(id).unwrap();
    let attrs = store.get("users", &id).unwrap();
    Record::new("users", id, attrs)
}

/// Emails that collide for the first `conflicts` calls, then are fresh
fn colliding_rules(conflicts: usize) -> (RuleSet, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let email_calls = Arc::clone(&calls);
    let rules = RuleSet::new()
        .generate("email", move |_| {
            let n = email_calls.fetch_add(1, Ordering::SeqCst);
            if n < conflicts {
                Ok(json!(format!("taken-{n}@example.invalid")))
            } else {
                Ok(json!(format!("fresh-{n}@example.invalid")))
            }
        })
        .template("nickname", "{nickname}-anon")
        .unwrap();
    (rules, calls)
}

/// Store whose nested scopes fail at commit with a uniqueness conflict for the
/// first `failures` commits, the way a deferred constraint reports
struct DeferredConflictStore {
    inner: Arc<MemoryStore>,
    failures: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
}

impl DeferredConflictStore {
    fn new(inner: Arc<MemoryStore>, failures: usize) -> Self {
        Self {
            inner,
            failures: Arc::new(AtomicUsize::new(failures)),
            commits: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl RecordStore for DeferredConflictStore {
    async fn begin_nested(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(DeferredConflictTransaction {
            inner: self.inner.begin_nested().await?,
            failures: Arc::clone(&self.failures),
            commits: Arc::clone(&self.commits),
        }))
    }

    async fn fetch(&self, record_type: &str, id: &RecordId) -> StoreResult<Option<Attributes>> {
        self.inner.fetch(record_type, id).await
    }

    async fn list_ids(&self, record_type: &str) -> StoreResult<Vec<RecordId>> {
        self.inner.list_ids(record_type).await
    }

    fn store_name(&self) -> &str {
        "deferred-conflict"
    }
}

struct DeferredConflictTransaction {
    inner: Box<dyn StoreTransaction>,
    failures: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreTransaction for DeferredConflictTransaction {
    async fn update(
        &mut self,
        record_type: &str,
        id: &RecordId,
        attributes: &Attributes,
    ) -> StoreResult<()> {
        self.inner.update(record_type, id, attributes).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let conflict = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflict {
            self.inner.rollback().await?;
            return Err(StoreError::UniqueViolation {
                constraint: "users_email_key".to_string(),
                message: "deferred check failed at commit".to_string(),
            });
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.rollback().await
    }
}

fn engine(store: &Arc<MemoryStore>, max_retries: u32) -> AnonymizationEngine {
    AnonymizationEngine::new(store.clone(), AnonymizationConfig::with_max_retries(max_retries))
        .unwrap()
}

#[tokio::test]
async fn test_no_collision_single_attempt() {
    let store = store_with_taken(0);
    let engine = engine(&store, 0);
    let (rules, _) = colliding_rules(0);
    let mut record = load(&store, "1").with_rules(rules);
    let keys_before: Vec<String> = record.attributes().keys().cloned().collect();

    let outcome = engine.anonymize_strict(&mut record).await.unwrap();

    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.fields, vec!["email", "nickname"]);
    assert_eq!(record.attributes()["email"], json!("fresh-0@example.invalid"));
    assert_eq!(record.attributes()["nickname"], json!("nick-1-anon"));
    assert_eq!(record.attributes()["plan"], json!("pro"));
    assert_eq!(
        record.attributes().keys().cloned().collect::<Vec<_>>(),
        keys_before
    );
    assert_eq!(store.get("users", record.record_id()).unwrap(), *record.attributes());
    assert_eq!(store.stats().begun, 1);
    assert_eq!(store.stats().committed, 1);
}

#[test_case(1, 1 ; "one conflict with one retry")]
#[test_case(2, 5 ; "two conflicts with spare retries")]
#[test_case(3, 3 ; "three conflicts with exact bound")]
#[tokio::test]
async fn test_conflicts_then_success(conflicts: usize, max_retries: u32) {
    let store = store_with_taken(conflicts);
    let engine = engine(&store, max_retries);
    let (rules, calls) = colliding_rules(conflicts);
    let mut record = load(&store, "1").with_rules(rules);

    let outcome = engine.anonymize_strict(&mut record).await.unwrap();

    assert_eq!(outcome.attempts as usize, conflicts + 1);
    assert_eq!(outcome.retries() as usize, conflicts);
    assert_eq!(calls.load(Ordering::SeqCst), conflicts + 1);
    assert_eq!(store.stats().begun, conflicts + 1);
    assert_eq!(store.stats().rolled_back, conflicts);
    assert_eq!(store.stats().committed, 1);

    // Only the last attempt's values are committed, and failed attempts
    // never feed into later ones.
    let persisted = store.get("users", record.record_id()).unwrap();
    assert_eq!(
        persisted["email"],
        json!(format!("fresh-{conflicts}@example.invalid"))
    );
    assert_eq!(persisted["nickname"], json!("nick-1-anon"));
}

#[test_case(0)]
#[test_case(1)]
#[test_case(3)]
#[tokio::test]
async fn test_always_conflicting_exhausts_retries(max_retries: u32) {
    let store = store_with_taken(1);
    let engine = engine(&store, max_retries);
    let rules = RuleSet::new().static_value("email", json!("taken-0@example.invalid"));
    let mut record = load(&store, "1").with_rules(rules.clone());

    let err = engine.anonymize_strict(&mut record).await.unwrap_err();

    assert_eq!(store.stats().begun, max_retries as usize + 1);
    assert_eq!(store.stats().committed, 0);
    assert_eq!(record.attributes()["email"], json!("jane@example.com"));

    // The surfaced error is exactly what the store reported.
    let mut direct = store.begin_nested().await.unwrap();
    let mut conflicting = record.attributes().clone();
    conflicting.insert("email".to_string(), json!("taken-0@example.invalid"));
    let expected = direct
        .update("users", record.record_id(), &conflicting)
        .await
        .unwrap_err();
    direct.rollback().await.unwrap();

    match err {
        AnonymousError::Store(store_err) => assert_eq!(store_err, expected),
        other => panic!("expected a store error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_strict_surfaces_exhausted_conflict() {
    let store = store_with_taken(1);
    let engine = engine(&store, 2);
    let mut record = load(&store, "1")
        .with_rules(RuleSet::new().static_value("email", json!("taken-0@example.invalid")));

    let err = engine.anonymize(&mut record).await.unwrap_err();

    assert!(err.is_unique_violation());
    assert_eq!(store.stats().begun, 3);
}

#[tokio::test]
async fn test_validation_failure_is_not_retried() {
    let store = store_with_taken(0);
    store
        .add_validator("users", |attrs| match attrs.get("email") {
            Some(Value::String(email)) if email.contains('@') => Ok(()),
            _ => Err("email is invalid".to_string()),
        })
        .unwrap();
    let engine = engine(&store, 5);
    let rules = RuleSet::new().static_value("email", json!("not-an-email"));

    let mut strict = load(&store, "1").with_rules(rules.clone());
    let err = engine.anonymize_strict(&mut strict).await.unwrap_err();
    assert!(matches!(
        err,
        AnonymousError::Store(StoreError::Validation(_))
    ));
    assert_eq!(store.stats().begun, 1);

    let mut lenient = load(&store, "1").with_rules(rules);
    assert!(!engine.anonymize(&mut lenient).await.unwrap());
    assert_eq!(store.stats().begun, 2);
    assert_eq!(lenient.attributes()["email"], json!("jane@example.com"));
    assert_eq!(
        store.get("users", lenient.record_id()).unwrap()["email"],
        json!("jane@example.com")
    );
}

#[tokio::test]
async fn test_missing_rules_fail_before_any_transaction() {
    let store = store_with_taken(0);
    let engine = engine(&store, 3);
    let mut record = load(&store, "1");

    let err = engine.anonymize_strict(&mut record).await.unwrap_err();
    match err {
        AnonymousError::NotImplemented { ref record_type } => assert_eq!(record_type, "users"),
        ref other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("users"));

    // Non-strict mode still raises for a missing rule set.
    assert!(engine.anonymize(&mut record).await.is_err());
    assert_eq!(store.stats().begun, 0);
}

#[tokio::test]
async fn test_rule_on_unknown_field_fails_before_any_transaction() {
    let store = store_with_taken(0);
    let engine = engine(&store, 3);
    let mut record =
        load(&store, "1").with_rules(RuleSet::new().static_value("ssn", json!("000-00-0000")));

    let err = engine.anonymize(&mut record).await.unwrap_err();

    assert!(matches!(err, AnonymousError::Configuration(_)));
    assert_eq!(store.stats().begun, 0);
}

#[tokio::test]
async fn test_retry_counter_resets_between_calls() {
    let store = store_with_taken(2);
    let engine = engine(&store, 2);

    // First call burns through every retry.
    let mut first = load(&store, "1")
        .with_rules(RuleSet::new().static_value("email", json!("taken-0@example.invalid")));
    assert!(engine.anonymize_strict(&mut first).await.is_err());

    // Second call gets the full budget again.
    let (rules, _) = colliding_rules(2);
    let mut second = load(&store, "1").with_rules(rules);
    let outcome = engine.anonymize_strict(&mut second).await.unwrap();
    assert_eq!(outcome.attempts, 3);
}

#[tokio::test]
async fn test_missing_row_is_not_found() {
    let store = store_with_taken(0);
    let engine = engine(&store, 2);
    let mut ghost = Record::new("users", RecordId::new("404").unwrap(), user("404", "x@example.com"))
        .with_rules(RuleSet::new().static_value("plan", json!("free")));

    let err = engine.anonymize_strict(&mut ghost).await.unwrap_err();
    assert!(matches!(err, AnonymousError::Store(StoreError::NotFound(_))));
    assert!(!engine.anonymize(&mut ghost).await.unwrap());
    assert_eq!(store.stats().begun, 2);
}

#[test_case(1, 1 ; "one commit conflict with one retry")]
#[test_case(2, 4 ; "two commit conflicts with spare retries")]
#[tokio::test]
async fn test_commit_time_conflict_is_retried(conflicts: usize, max_retries: u32) {
    let memory = store_with_taken(0);
    let store = Arc::new(DeferredConflictStore::new(memory.clone(), conflicts));
    let commits = Arc::clone(&store.commits);
    let engine =
        AnonymizationEngine::new(store, AnonymizationConfig::with_max_retries(max_retries))
            .unwrap();
    let (rules, calls) = colliding_rules(0);
    let mut record = load(&memory, "1").with_rules(rules);

    let outcome = engine.anonymize_strict(&mut record).await.unwrap();

    assert_eq!(outcome.attempts as usize, conflicts + 1);
    assert_eq!(commits.load(Ordering::SeqCst), conflicts + 1);
    assert_eq!(calls.load(Ordering::SeqCst), conflicts + 1);
    assert_eq!(memory.stats().begun, conflicts + 1);
    assert_eq!(memory.stats().committed, 1);
    assert_eq!(
        memory.get("users", record.record_id()).unwrap()["email"],
        json!(format!("fresh-{conflicts}@example.invalid"))
    );
}

#[tokio::test]
async fn test_commit_time_conflict_exhausts_retries() {
    let memory = store_with_taken(0);
    let store = Arc::new(DeferredConflictStore::new(memory.clone(), 5));
    let commits = Arc::clone(&store.commits);
    let engine =
        AnonymizationEngine::new(store, AnonymizationConfig::with_max_retries(2)).unwrap();
    let mut record = load(&memory, "1")
        .with_rules(RuleSet::new().static_value("plan", json!("free")));

    let err = engine.anonymize(&mut record).await.unwrap_err();

    assert!(err.is_unique_violation());
    assert_eq!(commits.load(Ordering::SeqCst), 3);
    assert_eq!(memory.stats().committed, 0);
    assert_eq!(
        memory.get("users", record.record_id()).unwrap()["plan"],
        json!("pro")
    );
}

#[tokio::test]
async fn test_failed_attempts_keep_ambient_work() {
    let store = store_with_taken(1);
    store
        .insert("users", RecordId::new("2").unwrap(), user("2", "john@example.com"))
        .unwrap();
    let engine = engine(&store, 2);
    store.begin().unwrap();

    let mut john = load(&store, "2")
        .with_rules(RuleSet::new().template("email", "user-{id}@example.invalid").unwrap());
    engine.anonymize_strict(&mut john).await.unwrap();

    // Every attempt for jane collides and is rolled back.
    let mut jane = load(&store, "1")
        .with_rules(RuleSet::new().static_value("email", json!("taken-0@example.invalid")));
    assert!(engine.anonymize_strict(&mut jane).await.is_err());
    assert_eq!(store.stats().rolled_back, 3);

    let pending = store.fetch("users", john.record_id()).await.unwrap().unwrap();
    assert_eq!(pending["email"], json!("user-2@example.invalid"));
    assert_eq!(
        store.get("users", john.record_id()).unwrap()["email"],
        json!("john@example.com")
    );

    store.commit().unwrap();
    assert_eq!(
        store.get("users", john.record_id()).unwrap()["email"],
        json!("user-2@example.invalid")
    );
    assert_eq!(
        store.get("users", jane.record_id()).unwrap()["email"],
        json!("jane@example.com")
    );
}

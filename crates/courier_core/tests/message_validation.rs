use courier_core::db::open_db_in_memory;
use courier_core::lock::{LocalLockManager, LockError, LockManager};
use courier_core::model::content::Content;
use courier_core::model::store_path::StorePaths;
use courier_core::repo::content_repo::{
    ContentQuery, ContentStore, SqliteContentStore, StoreError, StoreResult,
};
use courier_core::service::messaging_service::MessagingService;
use courier_core::service::settings_lookup::SettingsLookup;
use courier_core::service::validation::CreateMessageValidator;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

#[test]
fn missing_or_blank_marker_is_bad_request() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    let validator = CreateMessageValidator::new(SettingsLookup::new(&store, "/"));

    let err = validator
        .check_request(&params(&[("sakai:body", "hi")]), "/sites/a")
        .unwrap_err();
    assert_eq!(err.status, 400);

    let err = validator
        .check_request(&params(&[("sakai:marker", "  ")]), "/sites/a")
        .unwrap_err();
    assert_eq!(err.status, 400);
}

#[test]
fn marker_alone_is_accepted() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    let validator = CreateMessageValidator::new(SettingsLookup::new(&store, "/"));

    validator
        .check_request(&params(&[("sakai:marker", "M")]), "/sites/a")
        .unwrap();
}

#[test]
fn reply_on_must_resolve_under_base_path() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    let mut parent = Content::new("/sites/a/posts/p1");
    parent.set_property("sling:resourceType", "sakai/message");
    parent.set_property("sakai:id", "p1");
    parent.set_property("sakai:marker", "M");
    store.update(&parent).unwrap();
    let validator = CreateMessageValidator::new(SettingsLookup::new(&store, "/"));

    validator
        .check_request(
            &params(&[("sakai:marker", "M"), ("sakai:replyon", "p1")]),
            "/sites/a",
        )
        .unwrap();

    let missing = validator
        .check_request(
            &params(&[("sakai:marker", "M"), ("sakai:replyon", "nope")]),
            "/sites/a",
        )
        .unwrap_err();
    assert_eq!(missing.status, 400);

    let wrong_marker = validator
        .check_request(
            &params(&[("sakai:marker", "other"), ("sakai:replyon", "p1")]),
            "/sites/a",
        )
        .unwrap_err();
    assert_eq!(wrong_marker.status, 400);
}

struct BrokenQueries;

impl ContentStore for BrokenQueries {
    fn get(&self, _: &str) -> StoreResult<Option<Content>> {
        Ok(None)
    }

    fn exists(&self, _: &str) -> StoreResult<bool> {
        Ok(false)
    }

    fn update(&self, _: &Content) -> StoreResult<()> {
        Ok(())
    }

    fn copy(&self, from: &str, _: &str) -> StoreResult<()> {
        Err(StoreError::NotFound(from.to_string()))
    }

    fn find(&self, _: &ContentQuery) -> StoreResult<Vec<Content>> {
        Err(StoreError::InvalidData("query backend offline".to_string()))
    }

    fn list_children(&self, _: &str) -> StoreResult<Vec<Content>> {
        Ok(Vec::new())
    }
}

#[test]
fn reply_on_lookup_failure_is_internal_error() {
    let validator = CreateMessageValidator::new(SettingsLookup::new(&BrokenQueries, "/"));

    let err = validator
        .check_request(
            &params(&[("sakai:marker", "M"), ("sakai:replyon", "p1")]),
            "/sites/a",
        )
        .unwrap_err();
    assert_eq!(err.status, 500);
}

#[test]
fn create_writes_pending_message_to_sender_outbox() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    let locks = LocalLockManager::new(Duration::from_millis(200));
    let service = MessagingService::new(&store, &locks, StorePaths::default());

    let message = service
        .create(
            "alice",
            &params(&[
                ("sakai:to", "bob"),
                ("sakai:subject", "hi"),
                ("priority", "3"),
            ]),
            Some("m1"),
        )
        .unwrap();

    assert_eq!(message.id(), "m1");
    assert_eq!(
        message.path(),
        StorePaths::default().outbox_path("alice", "m1")
    );
    assert_eq!(message.message_box().unwrap(), Some("outbox"));
    assert_eq!(message.send_state().unwrap(), "pending");
    assert_eq!(message.sender().unwrap(), Some("alice"));
    assert_eq!(message.content().property("priority"), Some(&json!(3)));
    assert!(message.content().property("sakai:created").unwrap().is_i64());
    assert!(locks.held_locks().is_empty());
}

#[test]
fn create_generates_id_and_rejects_bad_or_duplicate_ids() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    let locks = LocalLockManager::new(Duration::from_millis(200));
    let service = MessagingService::new(&store, &locks, StorePaths::default());

    let generated = service.create("alice", &params(&[]), None).unwrap();
    assert_eq!(generated.id().len(), 32);

    let bad = service
        .create("alice", &params(&[]), Some("../escape"))
        .unwrap_err();
    assert_eq!(bad.status, 400);

    service.create("alice", &params(&[]), Some("dup")).unwrap();
    let duplicate = service
        .create("alice", &params(&[]), Some("dup"))
        .unwrap_err();
    assert_eq!(duplicate.status, 409);
    assert!(locks.held_locks().is_empty());
}

struct TimeoutLocks;

impl LockManager for TimeoutLocks {
    fn wait_for_lock(&self, path: &str) -> Result<(), LockError> {
        Err(LockError::Timeout {
            path: path.to_string(),
            waited_ms: 0,
        })
    }

    fn clear_locks(&self) {}
}

#[test]
fn create_maps_lock_timeout_to_internal_error() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    let service = MessagingService::new(&store, &TimeoutLocks, StorePaths::default());

    let err = service.create("alice", &params(&[]), None).unwrap_err();
    assert_eq!(err.status, 500);
}

#[test]
fn store_and_message_paths_are_sharded() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    let locks = LocalLockManager::new(Duration::from_millis(200));
    let service = MessagingService::new(&store, &locks, StorePaths::default());

    let store_path = service.full_path_to_store("alice");
    assert!(store_path.starts_with("/_messages/"));
    assert!(store_path.ends_with("/alice/message"));
    assert_eq!(store_path, service.full_path_to_store("alice"));

    let message_path = service.full_path_to_message("alice", "m1");
    assert!(message_path.starts_with(&format!("{store_path}/inbox/")));
    assert!(message_path.ends_with("/m1"));
    assert_eq!(service.expand_aliases("alice"), vec!["alice".to_string()]);
}

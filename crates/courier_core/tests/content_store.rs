use courier_core::db::open_db_in_memory;
use courier_core::model::content::Content;
use courier_core::repo::content_repo::{ContentQuery, ContentStore, SqliteContentStore, StoreError};
use serde_json::{json, Value};

#[test]
fn update_creates_missing_ancestors() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();

    let mut node = Content::new("/a/b/c");
    node.set_property("title", "hello");
    store.update(&node).unwrap();

    assert!(store.exists("/").unwrap());
    assert!(store.exists("/a").unwrap());
    assert!(store.exists("/a/b").unwrap());
    let loaded = store.get("/a/b/c").unwrap().unwrap();
    assert_eq!(loaded.property("title"), Some(&json!("hello")));
    assert_eq!(store.list_children("/a").unwrap().len(), 1);
}

#[test]
fn update_merges_properties_and_null_removes() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();

    let mut first = Content::new("/n");
    first.set_property("keep", 1);
    first.set_property("drop", "x");
    store.update(&first).unwrap();

    let mut second = Content::new("/n");
    second.set_property("drop", Value::Null);
    second.set_property("added", true);
    store.update(&second).unwrap();

    let loaded = store.get("/n").unwrap().unwrap();
    assert_eq!(loaded.property("keep"), Some(&json!(1)));
    assert_eq!(loaded.property("added"), Some(&json!(true)));
    assert!(!loaded.has_property("drop"));
}

#[test]
fn copy_replaces_destination_subtree() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();

    let mut source = Content::new("/src/msg");
    source.set_property("body", "hi");
    store.update(&source).unwrap();
    store.update(&Content::new("/src/msg/attachment")).unwrap();

    let mut stale = Content::new("/dst/msg/old");
    stale.set_property("stale", true);
    store.update(&stale).unwrap();

    store.copy("/src/msg", "/dst/msg").unwrap();

    let copied = store.get("/dst/msg").unwrap().unwrap();
    assert_eq!(copied.property("body"), Some(&json!("hi")));
    assert!(store.exists("/dst/msg/attachment").unwrap());
    assert!(!store.exists("/dst/msg/old").unwrap());
    assert!(store.exists("/src/msg").unwrap());
}

#[test]
fn copy_does_not_touch_sibling_with_shared_prefix() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    store.update(&Content::new("/src/m")).unwrap();
    store.update(&Content::new("/dst/m2")).unwrap();

    store.copy("/src/m", "/dst/m").unwrap();

    assert!(store.exists("/dst/m").unwrap());
    assert!(store.exists("/dst/m2").unwrap());
}

#[test]
fn copy_of_missing_source_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();

    let err = store.copy("/missing", "/dst").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(path) if path == "/missing"));
}

#[test]
fn relative_paths_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();

    assert!(matches!(
        store.get("relative"),
        Err(StoreError::InvalidPath(_))
    ));
}

#[test]
fn find_filters_by_subtree_and_properties() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    for (path, kind) in [("/x/1", "a"), ("/x/2", "b"), ("/x/3", "a"), ("/y/1", "a")] {
        let mut node = Content::new(path);
        node.set_property("kind", kind);
        store.update(&node).unwrap();
    }

    let found = store
        .find(&ContentQuery::under("/x").with_property("kind", "a"))
        .unwrap();
    let paths: Vec<&str> = found.iter().map(|node| node.path.as_str()).collect();
    assert_eq!(paths, vec!["/x/1", "/x/3"]);

    let limited = store
        .find(&ContentQuery::under("/").with_property("kind", "a").limit(1))
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn copy_onto_itself_requires_existing_source() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();

    let err = store.copy("/missing", "/missing").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(path) if path == "/missing"));

    store.update(&Content::new("/present")).unwrap();
    store.copy("/present", "/present").unwrap();
    assert!(store.exists("/present").unwrap());
}

#[test]
fn find_skips_non_matching_rows_without_decoding_them() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    let mut wanted = Content::new("/x/wanted");
    wanted.set_property("kind", "a");
    store.update(&wanted).unwrap();
    conn.execute(
        "INSERT INTO content_nodes (path, parent_path, properties)
         VALUES ('/x/list', '/x', '[]'), ('/x/broken', '/x', 'not json');",
        [],
    )
    .unwrap();

    let found = store
        .find(&ContentQuery::under("/x").with_property("kind", "a"))
        .unwrap();
    let paths: Vec<&str> = found.iter().map(|node| node.path.as_str()).collect();
    assert_eq!(paths, vec!["/x/wanted"]);
}

#[test]
fn find_compares_scalar_filters_by_json_type() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteContentStore::try_new(&conn).unwrap();
    for (path, value) in [
        ("/v/text", json!("1")),
        ("/v/int", json!(1)),
        ("/v/float", json!(1.5)),
        ("/v/yes", json!(true)),
        ("/v/no", json!(false)),
    ] {
        let mut node = Content::new(path);
        node.set_property("value", value);
        store.update(&node).unwrap();
    }

    let paths = |value: Value| -> Vec<String> {
        store
            .find(&ContentQuery::under("/v").with_property("value", value))
            .unwrap()
            .into_iter()
            .map(|node| node.path)
            .collect()
    };
    assert_eq!(paths(json!("1")), vec!["/v/text"]);
    assert_eq!(paths(json!(1)), vec!["/v/int"]);
    assert_eq!(paths(json!(1.5)), vec!["/v/float"]);
    assert_eq!(paths(json!(true)), vec!["/v/yes"]);
    assert_eq!(paths(json!(false)), vec!["/v/no"]);
}

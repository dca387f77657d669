use courier_core::db::migrations::latest_version;
use courier_core::db::{open_db, open_db_in_memory, DbError};
use courier_core::repo::content_repo::{SqliteContentStore, StoreError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "content_nodes");
    assert_table_exists(&conn, "authorizables");
    assert_table_exists(&conn, "group_members");
}

#[test]
fn reopening_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("courier.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert_table_exists(&second, "content_nodes");
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn store_refuses_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteContentStore::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        StoreError::Db(DbError::UninitializedConnection {
            actual_version: 0,
            ..
        })
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "expected table `{table_name}` to exist");
}

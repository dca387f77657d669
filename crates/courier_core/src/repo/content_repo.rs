//! Content tree contracts and SQLite implementation.
//!
//! # Responsibility
//! - Path-addressed get/exists/update/copy on property-bag nodes.
//! - Property-filter queries scoped to a subtree.
//!
//! # Invariants
//! - Writing a node creates every missing ancestor as an empty node.
//! - `update` merges properties; a JSON `null` value removes the key.
//! - `copy` replaces the destination subtree with the source subtree.
//! - Query results are ordered by path.
//! - Scalar property filters are evaluated in SQL; only candidate rows are decoded.

use crate::db::{ensure_table_ready, DbError};
use crate::model::content::{normalize_path, parent_path, Content, Properties, ROOT_PATH};
use rusqlite::types::Value as SqlValue;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from content store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Source node of an operation does not exist.
    NotFound(String),
    /// Path is not absolute.
    InvalidPath(String),
    /// Persisted properties cannot be decoded or encoded.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(path) => write!(f, "content not found: {path}"),
            Self::InvalidPath(path) => write!(f, "content path must be absolute: `{path}`"),
            Self::InvalidData(message) => write!(f, "invalid content data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Property-filter query over one subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentQuery {
    /// Subtree root; the root node itself is included.
    pub base_path: String,
    /// Exact-match property filters, all of which must hold.
    pub filters: Vec<(String, Value)>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl ContentQuery {
    pub fn under(base_path: impl AsRef<str>) -> Self {
        Self {
            base_path: normalize_path(base_path.as_ref()),
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, content: &Content) -> bool {
        self.filters
            .iter()
            .all(|(key, expected)| content.property(key) == Some(expected))
    }
}

/// Hierarchical content store contract.
pub trait ContentStore {
    /// Loads one node.
    fn get(&self, path: &str) -> StoreResult<Option<Content>>;
    /// Checks node existence.
    fn exists(&self, path: &str) -> StoreResult<bool>;
    /// Creates or merges one node, creating missing ancestors.
    fn update(&self, content: &Content) -> StoreResult<()>;
    /// Copies the subtree at `from` to `to`, replacing any existing subtree.
    fn copy(&self, from: &str, to: &str) -> StoreResult<()>;
    /// Finds nodes under a subtree matching all property filters.
    fn find(&self, query: &ContentQuery) -> StoreResult<Vec<Content>>;
    /// Lists direct children ordered by path.
    fn list_children(&self, path: &str) -> StoreResult<Vec<Content>>;
}

/// SQLite-backed content store.
pub struct SqliteContentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContentStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_table_ready(
            conn,
            "content_nodes",
            &["path", "parent_path", "properties", "created_at", "updated_at"],
        )?;
        Ok(Self { conn })
    }
}

impl ContentStore for SqliteContentStore<'_> {
    fn get(&self, path: &str) -> StoreResult<Option<Content>> {
        let path = validate_path(path)?;
        load_node(self.conn, &path)
    }

    fn exists(&self, path: &str) -> StoreResult<bool> {
        let path = validate_path(path)?;
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM content_nodes WHERE path = ?1);",
            [path.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn update(&self, content: &Content) -> StoreResult<()> {
        let path = validate_path(&content.path)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_ancestors(&tx, &path)?;

        let mut merged = load_node(&tx, &path)?
            .map(|existing| existing.properties)
            .unwrap_or_default();
        for (key, value) in &content.properties {
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
        write_node(&tx, &path, &merged)?;
        tx.commit()?;
        Ok(())
    }

    fn copy(&self, from: &str, to: &str) -> StoreResult<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        if from == to {
            if !self.exists(&from)? {
                return Err(StoreError::NotFound(from));
            }
            return Ok(());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let source = load_subtree(&tx, &from)?;
        if source.is_empty() {
            return Err(StoreError::NotFound(from));
        }

        tx.execute(
            "DELETE FROM content_nodes
             WHERE path = ?1
                OR substr(path, 1, length(?2)) = ?2;",
            params![to.as_str(), subtree_prefix(&to)],
        )?;
        ensure_ancestors(&tx, &to)?;

        for node in source {
            let relative = if from == ROOT_PATH {
                node.path.as_str()
            } else {
                &node.path[from.len()..]
            };
            let target = normalize_path(&format!("{to}{relative}"));
            write_node(&tx, &target, &node.properties)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn find(&self, query: &ContentQuery) -> StoreResult<Vec<Content>> {
        let base = validate_path(&query.base_path)?;
        let prefix = subtree_prefix(&base);
        let mut sql = String::from(
            "SELECT path, properties
             FROM content_nodes
             WHERE (path = ? OR substr(path, 1, length(?)) = ?)",
        );
        let mut bind = vec![
            SqlValue::Text(base),
            SqlValue::Text(prefix.clone()),
            SqlValue::Text(prefix),
        ];
        for (key, expected) in &query.filters {
            if let Some((clause, value)) = filter_clause(expected) {
                sql.push_str(clause);
                bind.push(SqlValue::Text(json_key_path(key)));
                bind.push(value);
            }
        }
        sql.push_str(" ORDER BY path ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            if query.limit.is_some_and(|limit| result.len() >= limit) {
                break;
            }
            let node = decode_node(row.get(0)?, row.get(1)?)?;
            if query.matches(&node) {
                result.push(node);
            }
        }
        Ok(result)
    }

    fn list_children(&self, path: &str) -> StoreResult<Vec<Content>> {
        let path = validate_path(path)?;
        let mut stmt = self.conn.prepare(
            "SELECT path, properties
             FROM content_nodes
             WHERE parent_path = ?1
             ORDER BY path ASC;",
        )?;
        let mut rows = stmt.query([path.as_str()])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(decode_node(row.get(0)?, row.get(1)?)?);
        }
        Ok(result)
    }
}

fn validate_path(path: &str) -> StoreResult<String> {
    if !path.starts_with('/') {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(normalize_path(path))
}

fn subtree_prefix(path: &str) -> String {
    if path == ROOT_PATH {
        ROOT_PATH.to_string()
    } else {
        format!("{path}/")
    }
}

/// SQL predicate narrowing candidates for one scalar filter.
///
/// Rows whose properties are not valid JSON never match. Null, array and
/// object filters are left to [`ContentQuery::matches`].
fn filter_clause(expected: &Value) -> Option<(&'static str, SqlValue)> {
    const EXTRACT: &str = " AND json_extract(
        CASE WHEN json_valid(properties) THEN properties END, ?) = ?";
    const TYPE: &str = " AND json_type(
        CASE WHEN json_valid(properties) THEN properties END, ?) = ?";
    match expected {
        Value::String(value) => Some((EXTRACT, SqlValue::Text(value.clone()))),
        Value::Bool(value) => Some((TYPE, SqlValue::Text(value.to_string()))),
        Value::Number(number) => number
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| number.as_f64().map(SqlValue::Real))
            .map(|value| (EXTRACT, value)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// JSON path addressing one top-level key, e.g. `$."sakai:marker"`.
fn json_key_path(key: &str) -> String {
    format!("$.\"{}\"", key.replace('"', "\\\""))
}

fn load_node(conn: &Connection, path: &str) -> StoreResult<Option<Content>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT path, properties FROM content_nodes WHERE path = ?1;",
            [path],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    row.map(|(path, properties)| decode_node(path, properties))
        .transpose()
}

fn load_subtree(conn: &Connection, path: &str) -> StoreResult<Vec<Content>> {
    let mut stmt = conn.prepare(
        "SELECT path, properties
         FROM content_nodes
         WHERE path = ?1
            OR substr(path, 1, length(?2)) = ?2
         ORDER BY path ASC;",
    )?;
    let mut rows = stmt.query(params![path, subtree_prefix(path)])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(decode_node(row.get(0)?, row.get(1)?)?);
    }
    Ok(result)
}

fn ensure_ancestors(conn: &Connection, path: &str) -> StoreResult<()> {
    let mut cursor = parent_path(path);
    while let Some(current) = cursor {
        conn.execute(
            "INSERT OR IGNORE INTO content_nodes (path, parent_path, properties)
             VALUES (?1, ?2, '{}');",
            params![current, parent_path(current)],
        )?;
        cursor = parent_path(current);
    }
    Ok(())
}

fn write_node(conn: &Connection, path: &str, properties: &Properties) -> StoreResult<()> {
    let encoded = serde_json::to_string(properties)
        .map_err(|err| StoreError::InvalidData(format!("cannot encode `{path}`: {err}")))?;
    conn.execute(
        "INSERT INTO content_nodes (path, parent_path, properties)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(path) DO UPDATE SET
            properties = excluded.properties,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![path, parent_path(path), encoded],
    )?;
    Ok(())
}

fn decode_node(path: String, properties: String) -> StoreResult<Content> {
    let properties: Properties = serde_json::from_str(&properties).map_err(|err| {
        StoreError::InvalidData(format!("invalid properties in content_nodes `{path}`: {err}"))
    })?;
    Ok(Content { path, properties })
}

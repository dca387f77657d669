//! Authorizable directory contracts and SQLite implementation.
//!
//! # Responsibility
//! - Resolve identity strings to users or groups.
//! - Expose direct group membership in insertion order.
//!
//! # Invariants
//! - Unknown identities resolve to `Ok(None)`.
//! - Membership is stored flat; nested groups are expanded by callers.

use crate::db::{ensure_table_ready, DbError};
use crate::model::authorizable::{Authorizable, AuthorizableKind};
use crate::model::content::Properties;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors from directory operations.
#[derive(Debug)]
pub enum DirectoryError {
    Db(DbError),
    /// Persisted row cannot be decoded.
    InvalidData(String),
    /// Referenced authorizable does not exist.
    NotFound(String),
    /// Membership change targeted a user.
    NotAGroup(String),
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid directory data: {message}"),
            Self::NotFound(id) => write!(f, "authorizable not found: {id}"),
            Self::NotAGroup(id) => write!(f, "authorizable `{id}` is not a group"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for DirectoryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DirectoryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Identity resolution contract used by delivery.
pub trait Directory {
    /// Resolves one identity string.
    fn find_authorizable(&self, id: &str) -> DirectoryResult<Option<Authorizable>>;
}

/// SQLite-backed directory.
pub struct SqliteDirectory<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectory<'conn> {
    /// Creates directory from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> DirectoryResult<Self> {
        ensure_table_ready(conn, "authorizables", &["id", "kind", "properties"])?;
        ensure_table_ready(conn, "group_members", &["group_id", "member_id", "sort_order"])?;
        Ok(Self { conn })
    }

    pub fn create_user(&self, id: &str, properties: &Properties) -> DirectoryResult<()> {
        self.insert(id, AuthorizableKind::User, properties)
    }

    pub fn create_group(&self, id: &str, properties: &Properties) -> DirectoryResult<()> {
        self.insert(id, AuthorizableKind::Group, properties)
    }

    /// Appends `member` to `group`. Re-adding an existing member is a no-op.
    pub fn add_member(&self, group: &str, member: &str) -> DirectoryResult<()> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT kind FROM authorizables WHERE id = ?1;",
                [group],
                |row| row.get(0),
            )
            .optional()?;
        match kind.as_deref() {
            None => return Err(DirectoryError::NotFound(group.to_string())),
            Some("group") => {}
            Some(_) => return Err(DirectoryError::NotAGroup(group.to_string())),
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO group_members (group_id, member_id, sort_order)
             VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM group_members WHERE group_id = ?1)
             );",
            params![group, member],
        )?;
        Ok(())
    }

    fn insert(
        &self,
        id: &str,
        kind: AuthorizableKind,
        properties: &Properties,
    ) -> DirectoryResult<()> {
        let id = id.trim();
        if id.is_empty() {
            return Err(DirectoryError::InvalidData(
                "authorizable id must not be blank".to_string(),
            ));
        }
        let encoded = serde_json::to_string(properties)
            .map_err(|err| DirectoryError::InvalidData(err.to_string()))?;
        self.conn.execute(
            "INSERT INTO authorizables (id, kind, properties)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                properties = excluded.properties;",
            params![id, kind.as_str(), encoded],
        )?;
        Ok(())
    }
}

impl Directory for SqliteDirectory<'_> {
    fn find_authorizable(&self, id: &str) -> DirectoryResult<Option<Authorizable>> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, kind, properties FROM authorizables WHERE id = ?1;",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((id, kind, properties)) = row else {
            return Ok(None);
        };

        let kind = AuthorizableKind::parse(&kind).ok_or_else(|| {
            DirectoryError::InvalidData(format!("invalid kind `{kind}` for authorizable `{id}`"))
        })?;
        let properties: Properties = serde_json::from_str(&properties).map_err(|err| {
            DirectoryError::InvalidData(format!("invalid properties for authorizable `{id}`: {err}"))
        })?;

        let members = if kind == AuthorizableKind::Group {
            let mut stmt = self.conn.prepare(
                "SELECT member_id
                 FROM group_members
                 WHERE group_id = ?1
                 ORDER BY sort_order ASC;",
            )?;
            let rows = stmt.query_map([id.as_str()], |row| row.get::<_, String>(0))?;
            let members = rows.collect::<Result<Vec<_>, _>>()?;
            members
        } else {
            Vec::new()
        };

        Ok(Some(Authorizable {
            id,
            kind,
            properties,
            members,
        }))
    }
}

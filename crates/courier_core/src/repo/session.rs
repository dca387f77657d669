//! Administrative sessions over the content store and directory.
//!
//! # Responsibility
//! - Bundle the store handles one delivery attempt works with.
//! - Scope the session to one attempt; release is logged on drop.
//!
//! # Invariants
//! - A session is never shared across delivery attempts.
//! - Opening a session fails when the backing schema is not ready.

use crate::db::{migrations::latest_version, schema_version, DbError};
use crate::repo::content_repo::{ContentStore, SqliteContentStore, StoreError};
use crate::repo::directory_repo::{Directory, DirectoryError, SqliteDirectory};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised while opening an administrative session.
#[derive(Debug)]
pub enum SessionError {
    /// Backing store refused the login.
    Unavailable(String),
    Db(DbError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "administrative session unavailable: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for SessionError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<StoreError> for SessionError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Db(err) => Self::Db(err),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<DirectoryError> for SessionError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::Db(err) => Self::Db(err),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Scoped administrative view of the content store and directory.
pub struct AdminSession<'a> {
    content: &'a dyn ContentStore,
    directory: &'a dyn Directory,
}

impl<'a> AdminSession<'a> {
    pub fn new(content: &'a dyn ContentStore, directory: &'a dyn Directory) -> Self {
        log::debug!("event=session_login module=session status=ok");
        Self { content, directory }
    }

    pub fn content(&self) -> &'a dyn ContentStore {
        self.content
    }

    pub fn directory(&self) -> &'a dyn Directory {
        self.directory
    }
}

impl Drop for AdminSession<'_> {
    fn drop(&mut self) {
        log::debug!("event=session_logout module=session status=ok");
    }
}

/// Source of administrative sessions.
pub trait SessionProvider {
    fn login_administrative(&self) -> Result<AdminSession<'_>, SessionError>;
}

/// SQLite-backed repository bundling content store and directory.
pub struct SqliteRepository<'conn> {
    conn: &'conn Connection,
    content: SqliteContentStore<'conn>,
    directory: SqliteDirectory<'conn>,
}

impl<'conn> SqliteRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> Result<Self, SessionError> {
        Ok(Self {
            conn,
            content: SqliteContentStore::try_new(conn)?,
            directory: SqliteDirectory::try_new(conn)?,
        })
    }

    pub fn content(&self) -> &SqliteContentStore<'conn> {
        &self.content
    }

    pub fn directory(&self) -> &SqliteDirectory<'conn> {
        &self.directory
    }
}

impl SessionProvider for SqliteRepository<'_> {
    fn login_administrative(&self) -> Result<AdminSession<'_>, SessionError> {
        let actual_version = schema_version(self.conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(SessionError::Db(DbError::UninitializedConnection {
                expected_version,
                actual_version,
            }));
        }
        Ok(AdminSession::new(&self.content, &self.directory))
    }
}

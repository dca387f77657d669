//! Internal delivery of one message to its resolved recipients.
//!
//! # Responsibility
//! - Expand groups into users with an explicit worklist.
//! - Copy the message into each authorized recipient's inbox and stamp it.
//!
//! # Invariants
//! - Each distinct recipient is visited at most once per `deliver` call,
//!   including through cyclic or overlapping groups.
//! - Only `internal` routes are delivered; other transports are ignored.
//! - A per-recipient failure never aborts the remaining recipients.
//! - Destination locks are released on every exit path once acquired.
//! - Failing to open the administrative session aborts the attempt.

use crate::lock::{LockError, LockManager};
use crate::model::content::{parent_path, Content, ROOT_PATH};
use crate::model::message::{
    Message, BOX_INBOX, PROP_MESSAGEBOX, PROP_MESSAGE_STORE, PROP_READ, PROP_SENDSTATE, PROP_TO,
    STATE_NOTIFIED,
};
use crate::model::route::RouteSet;
use crate::model::store_path::StorePaths;
use crate::repo::content_repo::StoreError;
use crate::repo::directory_repo::DirectoryError;
use crate::repo::session::{AdminSession, SessionError, SessionProvider};
use crate::service::access::{has_public_marker, DeliveryAuthorizer};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fatal delivery failure; nothing was delivered.
#[derive(Debug)]
pub enum DeliveryError {
    Session(SessionError),
}

impl Display for DeliveryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session(err) => write!(f, "delivery aborted: {err}"),
        }
    }
}

impl Error for DeliveryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Session(err) => Some(err),
        }
    }
}

impl From<SessionError> for DeliveryError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

/// Failure scoped to one recipient.
#[derive(Debug)]
pub enum RecipientError {
    Lock(LockError),
    Store(StoreError),
    Directory(DirectoryError),
}

impl Display for RecipientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lock(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Directory(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RecipientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lock(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Directory(err) => Some(err),
        }
    }
}

impl From<LockError> for RecipientError {
    fn from(value: LockError) -> Self {
        Self::Lock(value)
    }
}

impl From<StoreError> for RecipientError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<DirectoryError> for RecipientError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

/// One successful copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredRecord {
    pub recipient: String,
    /// Path of the inbox copy.
    pub path: String,
}

/// One recipient that could not be delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelivery {
    pub recipient: String,
    pub error: String,
}

/// Outcome of one `deliver` call. Ordering is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<DeliveredRecord>,
    /// Recipients skipped by the access check.
    pub denied: Vec<String>,
    pub failed: Vec<FailedDelivery>,
}

impl DeliveryReport {
    pub fn delivered_to(&self, recipient: &str) -> bool {
        self.delivered
            .iter()
            .any(|record| record.recipient == recipient)
    }

    pub fn failed_for(&self, recipient: &str) -> bool {
        self.failed
            .iter()
            .any(|failure| failure.recipient == recipient)
    }
}

/// Releases every lock held by this thread when dropped.
struct LockRelease<'a>(&'a dyn LockManager);

impl Drop for LockRelease<'_> {
    fn drop(&mut self) {
        self.0.clear_locks();
    }
}

/// Store-to-store delivery engine for `internal` routes.
pub struct InternalDelivery<'a> {
    sessions: &'a dyn SessionProvider,
    locks: &'a dyn LockManager,
    authorizer: &'a dyn DeliveryAuthorizer,
    paths: StorePaths,
}

impl<'a> InternalDelivery<'a> {
    pub fn new(
        sessions: &'a dyn SessionProvider,
        locks: &'a dyn LockManager,
        authorizer: &'a dyn DeliveryAuthorizer,
        paths: StorePaths,
    ) -> Self {
        Self {
            sessions,
            locks,
            authorizer,
            paths,
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Delivers `message` along every internal route in `routes`.
    ///
    /// # Errors
    /// - Returns [`DeliveryError::Session`] when no administrative session
    ///   can be opened. Per-recipient failures are reported, not returned.
    pub fn deliver(
        &self,
        routes: &RouteSet,
        message: &Message,
    ) -> Result<DeliveryReport, DeliveryError> {
        let session = self.sessions.login_administrative().map_err(|err| {
            error!(
                "event=deliver module=delivery status=error message_id={} error={}",
                message.id(),
                err
            );
            DeliveryError::Session(err)
        })?;

        let mut report = DeliveryReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        for route in routes.iter().filter(|route| route.is_internal()) {
            let mut worklist = vec![route.recipient().to_string()];
            while let Some(recipient) = worklist.pop() {
                if recipient.is_empty() || !seen.insert(recipient.clone()) {
                    continue;
                }
                match session.directory().find_authorizable(&recipient) {
                    Ok(Some(group)) if group.is_group() => {
                        debug!(
                            "event=group_expand module=delivery status=ok members={}",
                            group.members.len()
                        );
                        worklist.extend(
                            group
                                .members
                                .into_iter()
                                .rev()
                                .filter(|member| !seen.contains(member)),
                        );
                    }
                    Ok(_) => self.deliver_to_user(&session, &recipient, message, &mut report),
                    Err(err) => {
                        warn!(
                            "event=recipient_resolve module=delivery status=error message_id={} error={}",
                            message.id(),
                            err
                        );
                        report.failed.push(FailedDelivery {
                            recipient,
                            error: RecipientError::from(err).to_string(),
                        });
                    }
                }
            }
        }

        info!(
            "event=deliver module=delivery status=ok message_id={} delivered={} denied={} failed={}",
            message.id(),
            report.delivered.len(),
            report.denied.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn deliver_to_user(
        &self,
        session: &AdminSession<'_>,
        recipient: &str,
        message: &Message,
        report: &mut DeliveryReport,
    ) {
        let store_path = self.paths.store_path(recipient);
        let store_path = match store_path.trim_end_matches('/') {
            "" => ROOT_PATH,
            trimmed => trimmed,
        };

        if !self.is_authorized(session, recipient, store_path, message) {
            info!(
                "event=deliver_recipient module=delivery status=denied message_id={}",
                message.id()
            );
            report.denied.push(recipient.to_string());
            return;
        }

        match self.copy_into_inbox(session, recipient, store_path, message) {
            Ok(path) => report.delivered.push(DeliveredRecord {
                recipient: recipient.to_string(),
                path,
            }),
            Err(err) => {
                warn!(
                    "event=deliver_recipient module=delivery status=error message_id={} error={}",
                    message.id(),
                    err
                );
                report.failed.push(FailedDelivery {
                    recipient: recipient.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    fn is_authorized(
        &self,
        session: &AdminSession<'_>,
        recipient: &str,
        store_path: &str,
        message: &Message,
    ) -> bool {
        match has_public_marker(store_path, session) {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => warn!("event=access_check module=delivery status=error error={err}"),
        }
        self.authorizer
            .is_delivery_authorized(recipient, message, session)
    }

    fn copy_into_inbox(
        &self,
        session: &AdminSession<'_>,
        recipient: &str,
        store_path: &str,
        message: &Message,
    ) -> Result<String, RecipientError> {
        let destination = self.paths.message_path(recipient, message.id());
        let parent = parent_path(&destination).unwrap_or(ROOT_PATH).to_string();

        self.locks.wait_for_lock(&parent)?;
        let _release = LockRelease(self.locks);

        let store = session.content();
        if !store.exists(&parent)? {
            store.update(&Content::new(parent.as_str()))?;
        }
        store.copy(message.path(), &destination)?;

        let mut stamp = Content::new(destination.as_str());
        stamp.set_property(PROP_READ, false);
        stamp.set_property(PROP_MESSAGEBOX, BOX_INBOX);
        stamp.set_property(PROP_SENDSTATE, STATE_NOTIFIED);
        stamp.set_property(PROP_TO, recipient);
        stamp.set_property(PROP_MESSAGE_STORE, store_path);
        store.update(&stamp)?;
        Ok(destination)
    }
}

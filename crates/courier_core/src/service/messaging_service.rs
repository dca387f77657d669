//! Message creation in the sender's outbox.
//!
//! # Responsibility
//! - Build a message node from request parameters and persist it.
//! - Expose the deterministic store and message path calculation.
//!
//! # Invariants
//! - New messages land at `<sender store>/outbox/<id>` with send-state `pending`
//!   unless the caller supplied one.
//! - Integer-looking parameters are stored as numbers, except routing keys.
//! - The outbox write happens under the outbox lock.

use crate::lock::LockManager;
use crate::model::content::{parent_path, Content, ROOT_PATH};
use crate::model::message::{
    Message, BOX_OUTBOX, PROP_CREATED, PROP_FROM, PROP_ID, PROP_MARKER, PROP_MESSAGEBOX,
    PROP_REPLY_ON, PROP_RESOURCE_TYPE, PROP_SENDSTATE, PROP_TO, PROP_TYPE, RT_MESSAGE,
    STATE_PENDING,
};
use crate::model::store_path::StorePaths;
use crate::repo::content_repo::ContentStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

static MESSAGE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("valid message id regex"));

/// Keys whose values stay strings even when they look numeric.
const STRING_KEYS: [&str; 8] = [
    PROP_ID,
    PROP_FROM,
    PROP_TO,
    PROP_MARKER,
    PROP_TYPE,
    PROP_REPLY_ON,
    PROP_MESSAGEBOX,
    PROP_SENDSTATE,
];

/// Caller-facing error with an HTTP-style status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingError {
    pub status: u16,
    pub message: String,
}

impl MessagingError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

impl Display for MessagingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

impl Error for MessagingError {}

pub struct MessagingService<'a> {
    store: &'a dyn ContentStore,
    locks: &'a dyn LockManager,
    paths: StorePaths,
}

impl<'a> MessagingService<'a> {
    pub fn new(store: &'a dyn ContentStore, locks: &'a dyn LockManager, paths: StorePaths) -> Self {
        Self {
            store,
            locks,
            paths,
        }
    }

    /// Creates a message from `sender` in their outbox.
    ///
    /// # Errors
    /// - 400 for a blank sender or a malformed message id.
    /// - 409 when a message with the same id already exists in the outbox.
    /// - 500 for lock timeouts and storage failures.
    pub fn create(
        &self,
        sender: &str,
        properties: &BTreeMap<String, String>,
        message_id: Option<&str>,
    ) -> Result<Message, MessagingError> {
        let sender = sender.trim();
        if sender.is_empty() {
            return Err(MessagingError::bad_request("sender must not be blank"));
        }
        let message_id = match message_id.map(str::trim) {
            Some(id) if MESSAGE_ID_RE.is_match(id) => id.to_string(),
            Some(id) => {
                return Err(MessagingError::bad_request(format!(
                    "invalid message id `{id}`"
                )))
            }
            None => Uuid::new_v4().simple().to_string(),
        };

        let path = self.paths.outbox_path(sender, &message_id);
        let mut content = Content::new(path.as_str());
        for (key, value) in properties {
            content.set_property(key.as_str(), property_value(key, value));
        }
        content.set_property(PROP_ID, message_id.as_str());
        content.set_property(PROP_CREATED, now_epoch_ms());
        content.set_property(PROP_RESOURCE_TYPE, RT_MESSAGE);
        content.set_property(PROP_MESSAGEBOX, BOX_OUTBOX);
        if !content.has_property(PROP_FROM) {
            content.set_property(PROP_FROM, sender);
        }
        if !content.has_property(PROP_SENDSTATE) {
            content.set_property(PROP_SENDSTATE, STATE_PENDING);
        }

        let outbox = parent_path(&path).unwrap_or(ROOT_PATH).to_string();
        self.locks.wait_for_lock(&outbox).map_err(|err| {
            log::warn!("event=message_create module=messaging status=error error={err}");
            MessagingError::internal(err.to_string())
        })?;
        let result = self.write_new(&content);
        self.locks.clear_locks();
        let stored = result?;

        log::info!(
            "event=message_create module=messaging status=ok message_id={}",
            message_id
        );
        Message::from_content(stored).map_err(|err| MessagingError::internal(err.to_string()))
    }

    fn write_new(&self, content: &Content) -> Result<Content, MessagingError> {
        let storage = |err: crate::repo::content_repo::StoreError| {
            log::error!("event=message_create module=messaging status=error error={err}");
            MessagingError::internal(err.to_string())
        };
        if self.store.exists(&content.path).map_err(storage)? {
            return Err(MessagingError::new(
                409,
                format!("message already exists at `{}`", content.path),
            ));
        }
        self.store.update(content).map_err(storage)?;
        self.store
            .get(&content.path)
            .map_err(storage)?
            .ok_or_else(|| MessagingError::internal("created message not found in read-back"))
    }

    /// Store path of `recipient`.
    pub fn full_path_to_store(&self, recipient: &str) -> String {
        self.paths.store_path(recipient)
    }

    /// Inbox path of message `message_id` for `recipient`.
    pub fn full_path_to_message(&self, recipient: &str, message_id: &str) -> String {
        self.paths.message_path(recipient, message_id)
    }

    /// Expands a recipient alias. No alias table exists, so this is the identity.
    pub fn expand_aliases(&self, recipient: &str) -> Vec<String> {
        expand_aliases(recipient)
    }
}

/// Alias expansion shared with dispatch; returns the recipient itself.
pub fn expand_aliases(recipient: &str) -> Vec<String> {
    vec![recipient.to_string()]
}

fn property_value(key: &str, raw: &str) -> Value {
    if STRING_KEYS.contains(&key) {
        return Value::String(raw.to_string());
    }
    match raw.trim().parse::<i64>() {
        Ok(number) => Value::from(number),
        Err(_) => Value::String(raw.to_string()),
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{property_value, MESSAGE_ID_RE};
    use serde_json::json;

    #[test]
    fn numeric_values_become_integers_except_routing_keys() {
        assert_eq!(property_value("priority", " 42 "), json!(42));
        assert_eq!(property_value("subject", "4x"), json!("4x"));
        assert_eq!(property_value("sakai:to", "123"), json!("123"));
    }

    #[test]
    fn message_id_pattern_rejects_separators() {
        assert!(MESSAGE_ID_RE.is_match("abc-1.2_3"));
        assert!(!MESSAGE_ID_RE.is_match("../escape"));
        assert!(!MESSAGE_ID_RE.is_match("a/b"));
    }
}

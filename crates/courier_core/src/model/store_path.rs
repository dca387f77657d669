//! Deterministic recipient store and message paths.
//!
//! # Invariants
//! - Paths are pure functions of their inputs and the configured root.
//! - Store paths never end with a separator.
//! - Sharding uses the first two hex pairs of a name-based UUID, which keeps
//!   sibling counts bounded per directory level.

use crate::model::content::{join_path, normalize_path};
use crate::model::message::{BOX_INBOX, BOX_OUTBOX};
use uuid::Uuid;

/// Default root for per-recipient message stores.
pub const DEFAULT_MESSAGE_STORE_ROOT: &str = "/_messages";
/// Recipient prefix addressing a widget store by absolute path.
pub const WIDGET_RECIPIENT_PREFIX: &str = "w-";
/// Folder holding messages under a recipient home.
pub const FOLDER_MESSAGES: &str = "message";

/// Path calculator for message stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    root: String,
}

impl Default for StorePaths {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_STORE_ROOT)
    }
}

impl StorePaths {
    pub fn new(root: impl AsRef<str>) -> Self {
        Self {
            root: normalize_path(root.as_ref()),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Store path of one recipient, without trailing separator.
    pub fn store_path(&self, recipient: &str) -> String {
        if let Some(widget_path) = recipient.strip_prefix(WIDGET_RECIPIENT_PREFIX) {
            return normalize_path(widget_path);
        }
        normalize_path(&format!(
            "{}/{}/{}/{}",
            self.root,
            shard(recipient),
            recipient,
            FOLDER_MESSAGES
        ))
    }

    /// Inbox path of one message copy for a recipient.
    pub fn message_path(&self, recipient: &str, message_id: &str) -> String {
        let inbox = join_path(&self.store_path(recipient), BOX_INBOX);
        normalize_path(&format!("{inbox}/{}/{message_id}", shard(message_id)))
    }

    /// Outbox path of a message created by `sender`.
    pub fn outbox_path(&self, sender: &str, message_id: &str) -> String {
        let outbox = join_path(&self.store_path(sender), BOX_OUTBOX);
        join_path(&outbox, message_id)
    }
}

/// Two-level shard prefix (`ab/cd`) derived from `key`.
pub fn shard(key: &str) -> String {
    let hash = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
        .simple()
        .to_string();
    format!("{}/{}", &hash[0..2], &hash[2..4])
}

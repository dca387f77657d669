//! Message view over a content node.
//!
//! # Invariants
//! - Every `Message` carries a non-blank `sakai:id`.
//! - Accessors never panic on malformed data; they return `PropertyError`.

use crate::model::content::{Content, PropertyError};
use crate::model::route::Route;

/// Unique message identifier property.
pub const PROP_ID: &str = "sakai:id";
/// Correlation marker shared by a message and its settings node.
pub const PROP_MARKER: &str = "sakai:marker";
/// Message type / transport hint.
pub const PROP_TYPE: &str = "sakai:type";
/// Parent message identifier for replies.
pub const PROP_REPLY_ON: &str = "sakai:replyon";
/// Sender identity.
pub const PROP_FROM: &str = "sakai:from";
/// Comma separated recipient list (`transport:recipient` or bare recipient).
pub const PROP_TO: &str = "sakai:to";
/// Read flag on delivered copies.
pub const PROP_READ: &str = "sakai:read";
/// Mailbox the node currently sits in.
pub const PROP_MESSAGEBOX: &str = "sakai:messagebox";
/// Send-state of the message.
pub const PROP_SENDSTATE: &str = "sakai:sendstate";
/// Back-reference from a delivered copy to the recipient store.
pub const PROP_MESSAGE_STORE: &str = "sakai:messagestore";
/// Creation time in epoch milliseconds.
pub const PROP_CREATED: &str = "sakai:created";
/// Resource type of a node.
pub const PROP_RESOURCE_TYPE: &str = "sling:resourceType";

/// Resource type of message nodes.
pub const RT_MESSAGE: &str = "sakai/message";

pub const BOX_INBOX: &str = "inbox";
pub const BOX_OUTBOX: &str = "outbox";

pub const STATE_NONE: &str = "none";
pub const STATE_PENDING: &str = "pending";
pub const STATE_NOTIFIED: &str = "notified";

/// A persisted message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    content: Content,
}

impl Message {
    /// Wraps a content node, requiring a non-blank message id.
    pub fn from_content(content: Content) -> Result<Self, PropertyError> {
        content.required_string(PROP_ID)?;
        Ok(Self { content })
    }

    pub fn id(&self) -> &str {
        // Checked non-blank in `from_content`; the node is never mutated afterwards.
        self.content
            .string_property(PROP_ID)
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        &self.content.path
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn into_content(self) -> Content {
        self.content
    }

    pub fn marker(&self) -> Result<Option<&str>, PropertyError> {
        Ok(non_blank(self.content.string_property(PROP_MARKER)?))
    }

    /// Message type, stored as `sakai:type`.
    pub fn kind(&self) -> Result<Option<&str>, PropertyError> {
        Ok(non_blank(self.content.string_property(PROP_TYPE)?))
    }

    pub fn reply_on(&self) -> Result<Option<&str>, PropertyError> {
        Ok(non_blank(self.content.string_property(PROP_REPLY_ON)?))
    }

    pub fn sender(&self) -> Result<Option<&str>, PropertyError> {
        Ok(non_blank(self.content.string_property(PROP_FROM)?))
    }

    pub fn message_box(&self) -> Result<Option<&str>, PropertyError> {
        Ok(non_blank(self.content.string_property(PROP_MESSAGEBOX)?))
    }

    /// Send-state, `none` when unset.
    pub fn send_state(&self) -> Result<&str, PropertyError> {
        Ok(non_blank(self.content.string_property(PROP_SENDSTATE)?).unwrap_or(STATE_NONE))
    }

    /// Whether the node is typed as a message.
    pub fn is_message_node(content: &Content) -> bool {
        matches!(
            content.string_property(PROP_RESOURCE_TYPE),
            Ok(Some(RT_MESSAGE))
        )
    }

    /// Parses the `sakai:to` list into base routes.
    ///
    /// Accepts a comma separated string or a JSON array of strings. Blank
    /// entries are ignored.
    pub fn base_routes(&self) -> Result<Vec<Route>, PropertyError> {
        let entries: Vec<String> = match self.content.property(PROP_TO) {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::String(value)) => {
                value.split(',').map(str::to_string).collect()
            }
            Some(serde_json::Value::Array(values)) => values
                .iter()
                .map(|value| {
                    value
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| PropertyError::WrongType {
                            key: PROP_TO.to_string(),
                            expected: "string list",
                        })
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(PropertyError::WrongType {
                    key: PROP_TO.to_string(),
                    expected: "string list",
                })
            }
        };

        Ok(entries
            .iter()
            .filter_map(|entry| Route::parse(entry))
            .collect())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

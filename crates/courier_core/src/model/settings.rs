//! Notification settings attached to a marker.

use crate::model::content::{Content, PropertyError};

/// Resource type of settings nodes.
pub const RT_SETTINGS: &str = "sakai/settings";
/// Whether notifications are enabled.
pub const PROP_NOTIFICATION: &str = "sakai:notification";
/// Identity receiving notifications.
pub const PROP_NOTIFICATION_ADDRESS: &str = "sakai:notificationaddress";

/// Typed view over a settings node located by (marker, type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub path: String,
    pub notification_enabled: bool,
    pub notify_address: Option<String>,
}

impl Settings {
    pub fn from_content(content: &Content) -> Result<Self, PropertyError> {
        let notification_enabled = content.bool_property(PROP_NOTIFICATION)?.unwrap_or(false);
        let notify_address = content
            .string_property(PROP_NOTIFICATION_ADDRESS)?
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self {
            path: content.path.clone(),
            notification_enabled,
            notify_address,
        })
    }

    /// Address to notify, only when notifications are enabled.
    pub fn active_notify_address(&self) -> Option<&str> {
        if !self.notification_enabled {
            return None;
        }
        self.notify_address.as_deref()
    }
}

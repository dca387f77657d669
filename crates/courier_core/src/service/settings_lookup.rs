//! Settings and message lookup by correlation marker.
//!
//! # Invariants
//! - No match is `Ok(None)`; only storage failures are errors.
//! - The first match in path order wins.

use crate::model::content::PropertyError;
use crate::model::message::{
    Message, PROP_ID, PROP_MARKER, PROP_RESOURCE_TYPE, PROP_TYPE, RT_MESSAGE,
};
use crate::model::settings::{Settings, RT_SETTINGS};
use crate::repo::content_repo::{ContentQuery, ContentStore, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lookup failure other than "not found".
#[derive(Debug)]
pub enum LookupError {
    Store(StoreError),
    /// Matched node has malformed properties.
    Malformed { path: String, error: PropertyError },
}

impl Display for LookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "lookup failed: {err}"),
            Self::Malformed { path, error } => write!(f, "malformed node `{path}`: {error}"),
        }
    }
}

impl Error for LookupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Malformed { error, .. } => Some(error),
        }
    }
}

impl From<StoreError> for LookupError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Marker-keyed finder over the content store.
pub struct SettingsLookup<'a> {
    store: &'a dyn ContentStore,
    settings_root: String,
}

impl<'a> SettingsLookup<'a> {
    pub fn new(store: &'a dyn ContentStore, settings_root: impl Into<String>) -> Self {
        Self {
            store,
            settings_root: settings_root.into(),
        }
    }

    /// Finds the settings node for `(marker, kind)`.
    pub fn find_settings(&self, marker: &str, kind: &str) -> Result<Option<Settings>, LookupError> {
        let query = ContentQuery::under(&self.settings_root)
            .with_property(PROP_RESOURCE_TYPE, RT_SETTINGS)
            .with_property(PROP_MARKER, marker)
            .with_property(PROP_TYPE, kind)
            .limit(1);
        let Some(node) = self.store.find(&query)?.into_iter().next() else {
            return Ok(None);
        };
        Settings::from_content(&node)
            .map(Some)
            .map_err(|error| LookupError::Malformed {
                path: node.path.clone(),
                error,
            })
    }

    /// Finds the message `id` carrying `marker` under `base_path`.
    pub fn find_message(
        &self,
        id: &str,
        marker: &str,
        base_path: &str,
    ) -> Result<Option<Message>, LookupError> {
        let query = ContentQuery::under(base_path)
            .with_property(PROP_RESOURCE_TYPE, RT_MESSAGE)
            .with_property(PROP_ID, id)
            .with_property(PROP_MARKER, marker)
            .limit(1);
        let Some(node) = self.store.find(&query)?.into_iter().next() else {
            return Ok(None);
        };
        let path = node.path.clone();
        Message::from_content(node)
            .map(Some)
            .map_err(|error| LookupError::Malformed { path, error })
    }
}

#[cfg(test)]
mod tests {
    use super::SettingsLookup;
    use crate::db::open_db_in_memory;
    use crate::model::content::Content;
    use crate::repo::content_repo::{ContentStore, SqliteContentStore};

    fn settings_node(path: &str, marker: &str, kind: &str, address: &str) -> Content {
        let mut node = Content::new(path);
        node.set_property("sling:resourceType", "sakai/settings");
        node.set_property("sakai:marker", marker);
        node.set_property("sakai:type", kind);
        node.set_property("sakai:notification", true);
        node.set_property("sakai:notificationaddress", address);
        node
    }

    #[test]
    fn find_settings_matches_marker_and_type() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteContentStore::try_new(&conn).unwrap();
        store
            .update(&settings_node("/sites/a/settings", "M", "discussion", "admin"))
            .unwrap();
        store
            .update(&settings_node("/sites/b/settings", "M", "chat", "other"))
            .unwrap();

        let lookup = SettingsLookup::new(&store, "/");
        let found = lookup.find_settings("M", "discussion").unwrap().unwrap();
        assert_eq!(found.path, "/sites/a/settings");
        assert_eq!(found.active_notify_address(), Some("admin"));

        assert!(lookup.find_settings("N", "discussion").unwrap().is_none());
    }

    #[test]
    fn find_message_requires_message_resource_type() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteContentStore::try_new(&conn).unwrap();
        let mut node = Content::new("/sites/a/posts/m1");
        node.set_property("sakai:id", "m1");
        node.set_property("sakai:marker", "M");
        store.update(&node).unwrap();

        let lookup = SettingsLookup::new(&store, "/");
        assert!(lookup.find_message("m1", "M", "/sites/a").unwrap().is_none());

        node.set_property("sling:resourceType", "sakai/message");
        store.update(&node).unwrap();
        let message = lookup.find_message("m1", "M", "/sites/a").unwrap().unwrap();
        assert_eq!(message.id(), "m1");
        assert!(lookup.find_message("m1", "M", "/sites/b").unwrap().is_none());
    }
}

//! Compact JSON profile of a message recipient.

use crate::repo::directory_repo::Directory;
use serde_json::{Map, Value};

const PROFILE_KEYS: [&str; 7] = [
    "firstName",
    "lastName",
    "email",
    "picture",
    "preferredName",
    "sakai:group-title",
    "sakai:group-description",
];

pub struct ProfileWriter<'a> {
    directory: &'a dyn Directory,
}

impl<'a> ProfileWriter<'a> {
    pub fn new(directory: &'a dyn Directory) -> Self {
        Self { directory }
    }

    /// Renders `recipient` as a profile object, or as the raw string when unknown.
    pub fn write_profile(&self, recipient: &str) -> Value {
        let authorizable = match self.directory.find_authorizable(recipient) {
            Ok(Some(authorizable)) => authorizable,
            Ok(None) => return Value::String(recipient.to_string()),
            Err(err) => {
                log::warn!("event=profile_write module=profile status=degraded error={err}");
                return Value::String(recipient.to_string());
            }
        };

        let mut profile = Map::new();
        profile.insert("userid".to_string(), Value::String(authorizable.id.clone()));
        profile.insert(
            "type".to_string(),
            Value::String(authorizable.kind.as_str().to_string()),
        );
        for key in PROFILE_KEYS {
            if let Some(value) = authorizable.properties.get(key) {
                profile.insert(key.to_string(), value.clone());
            }
        }
        Value::Object(profile)
    }
}

//! Directory entries: users and groups.

use crate::model::content::Properties;
use serde::{Deserialize, Serialize};

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizableKind {
    User,
    Group,
}

impl AuthorizableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

/// One resolved identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Authorizable {
    pub id: String,
    pub kind: AuthorizableKind,
    /// Public profile properties.
    pub properties: Properties,
    /// Direct member identities; always empty for users.
    pub members: Vec<String>,
}

impl Authorizable {
    pub fn is_group(&self) -> bool {
        self.kind == AuthorizableKind::Group
    }

    /// Reads a string profile property, ignoring non-string values.
    pub fn string_property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

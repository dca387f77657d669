//! Property-bag content node and path helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Property map of one content node, ordered by key.
pub type Properties = BTreeMap<String, Value>;

/// Path separator of the content tree.
pub const PATH_SEPARATOR: char = '/';
/// Root path of the content tree.
pub const ROOT_PATH: &str = "/";

/// Typed-access failure on a content property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// A required property is absent.
    Missing(String),
    /// The property exists but has an unexpected JSON type.
    WrongType {
        key: String,
        expected: &'static str,
    },
}

impl Display for PropertyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "property `{key}` is missing"),
            Self::WrongType { key, expected } => {
                write!(f, "property `{key}` is not a {expected}")
            }
        }
    }
}

impl Error for PropertyError {}

/// One node of the hierarchical content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Absolute node path.
    pub path: String,
    /// Arbitrary JSON-valued properties.
    pub properties: Properties,
}

impl Content {
    /// Creates an empty node at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_properties(path, Properties::new())
    }

    pub fn with_properties(path: impl Into<String>, properties: Properties) -> Self {
        Self {
            path: normalize_path(&path.into()),
            properties,
        }
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Sets one property, replacing any previous value.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// Reads an optional string property.
    ///
    /// Returns `Ok(None)` when absent and an error when present with another type.
    pub fn string_property(&self, key: &str) -> Result<Option<&str>, PropertyError> {
        match self.properties.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.as_str())),
            Some(_) => Err(PropertyError::WrongType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    /// Reads a required, non-blank string property.
    pub fn required_string(&self, key: &str) -> Result<&str, PropertyError> {
        match self.string_property(key)? {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(PropertyError::Missing(key.to_string())),
        }
    }

    /// Reads an optional boolean property.
    ///
    /// Accepts JSON booleans and the strings `true`/`false` written by form posts.
    pub fn bool_property(&self, key: &str) -> Result<Option<bool>, PropertyError> {
        match self.properties.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(*value)),
            Some(Value::String(value)) => match value.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(PropertyError::WrongType {
                    key: key.to_string(),
                    expected: "boolean",
                }),
            },
            Some(_) => Err(PropertyError::WrongType {
                key: key.to_string(),
                expected: "boolean",
            }),
        }
    }

    /// Returns the last path segment, or an empty string for the root.
    pub fn name(&self) -> &str {
        object_name(&self.path)
    }
}

/// Normalizes a path to absolute form without duplicate or trailing separators.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .split(PATH_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        return ROOT_PATH.to_string();
    }
    format!("/{}", segments.join("/"))
}

/// Returns the parent of a normalized path, `None` for the root.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == ROOT_PATH || path.is_empty() {
        return None;
    }
    match path.rfind(PATH_SEPARATOR) {
        Some(0) => Some(ROOT_PATH),
        Some(index) => Some(&path[..index]),
        None => None,
    }
}

/// Returns the last segment of a normalized path.
pub fn object_name(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or_default()
}

/// Returns `path` and all of its ancestors, nearest first, ending with the root.
pub fn self_and_ancestors(path: &str) -> Vec<&str> {
    let mut chain = vec![path];
    let mut cursor = parent_path(path);
    while let Some(current) = cursor {
        chain.push(current);
        cursor = parent_path(current);
    }
    chain
}

/// Joins a child segment onto a base path.
pub fn join_path(base: &str, child: &str) -> String {
    normalize_path(&format!("{base}/{child}"))
}

#[cfg(test)]
mod tests {
    use super::{join_path, normalize_path, parent_path, self_and_ancestors, Content};
    use serde_json::json;

    #[test]
    fn normalize_strips_duplicate_and_trailing_separators() {
        assert_eq!(normalize_path("a//b/"), "/a/b");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn parent_path_walks_to_root() {
        assert_eq!(parent_path("/a/b"), Some("/a"));
        assert_eq!(parent_path("/a"), Some("/"));
        assert_eq!(parent_path("/"), None);
        assert_eq!(self_and_ancestors("/a/b"), vec!["/a/b", "/a", "/"]);
    }

    #[test]
    fn join_path_normalizes_result() {
        assert_eq!(join_path("/a/", "b"), "/a/b");
        assert_eq!(join_path("/", "b"), "/b");
    }

    #[test]
    fn typed_accessors_distinguish_absent_and_malformed() {
        let mut content = Content::new("/x");
        content.set_property("s", "value");
        content.set_property("n", 3);
        content.set_property("flag", "TRUE");

        assert_eq!(content.string_property("s").unwrap(), Some("value"));
        assert_eq!(content.string_property("missing").unwrap(), None);
        assert!(content.string_property("n").is_err());
        assert_eq!(content.bool_property("flag").unwrap(), Some(true));
        assert!(content.required_string("missing").is_err());

        content.set_property("blank", json!("  "));
        assert!(content.required_string("blank").is_err());
    }
}

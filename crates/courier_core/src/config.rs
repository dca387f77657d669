//! Runtime configuration for routing and delivery.
//!
//! # Invariants
//! - Every field has a default, so partial JSON documents are accepted.
//! - A validated config has a non-zero lock timeout and absolute roots.
//! - `internal` is never accepted as a pseudo-transport.

use crate::model::route::{TRANSPORT_CHAT, TRANSPORT_DISCUSSION, TRANSPORT_INTERNAL};
use crate::model::store_path::DEFAULT_MESSAGE_STORE_ROOT;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// Field value is out of range.
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read config: {err}"),
            Self::Parse(err) => write!(f, "cannot parse config: {err}"),
            Self::Invalid { field, message } => write!(f, "invalid config `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Upper bound on waiting for a destination lock.
    pub lock_timeout_ms: u64,
    /// Transport tags normalized to `internal` by the discussion router.
    pub pseudo_transports: Vec<String>,
    /// Subtree searched for settings nodes.
    pub settings_root: String,
    /// Root of recipient message stores.
    pub message_store_root: String,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            pseudo_transports: vec![
                TRANSPORT_DISCUSSION.to_string(),
                TRANSPORT_CHAT.to_string(),
            ],
            settings_root: "/".to_string(),
            message_store_root: DEFAULT_MESSAGE_STORE_ROOT.to_string(),
            log_level: None,
            log_dir: None,
        }
    }
}

impl CourierConfig {
    /// Reads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "lock_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self
            .pseudo_transports
            .iter()
            .any(|transport| transport.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "pseudo_transports",
                message: "entries must not be blank".to_string(),
            });
        }
        if self
            .pseudo_transports
            .iter()
            .any(|transport| transport.trim().eq_ignore_ascii_case(TRANSPORT_INTERNAL))
        {
            return Err(ConfigError::Invalid {
                field: "pseudo_transports",
                message: format!("`{TRANSPORT_INTERNAL}` is a real transport"),
            });
        }
        for (field, value) in [
            ("settings_root", &self.settings_root),
            ("message_store_root", &self.message_store_root),
        ] {
            if !value.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("`{value}` must be an absolute path"),
                });
            }
        }
        Ok(())
    }
}

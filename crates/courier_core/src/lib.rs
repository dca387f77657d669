//! Message routing and delivery core for Courier.
//! This crate is the single source of truth for routing and delivery invariants.

pub mod config;
pub mod db;
pub mod lock;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CourierConfig};
pub use lock::{LocalLockManager, LockError, LockManager};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::content::{Content, Properties, PropertyError};
pub use model::message::Message;
pub use model::route::{Route, RouteSet};
pub use model::store_path::StorePaths;
pub use repo::content_repo::{ContentQuery, ContentStore, SqliteContentStore, StoreError};
pub use repo::directory_repo::{Directory, DirectoryError, SqliteDirectory};
pub use repo::session::{AdminSession, SessionError, SessionProvider, SqliteRepository};
pub use service::access::{AllowAllAuthorizer, DeliveryAuthorizer, KnownRecipientAuthorizer};
pub use service::delivery::{DeliveryError, DeliveryReport, InternalDelivery};
pub use service::dispatcher::{DispatchError, DispatchOutcome, MessageDispatcher};
pub use service::messaging_service::{MessagingError, MessagingService};
pub use service::profile_writer::ProfileWriter;
pub use service::route_resolver::{DiscussionRouter, MessageRouter, RouterChain, SmtpRouter};
pub use service::settings_lookup::{LookupError, SettingsLookup};
pub use service::validation::CreateMessageValidator;

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

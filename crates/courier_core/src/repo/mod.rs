//! Repository layer: content tree, authorizable directory and sessions.
//!
//! # Responsibility
//! - Define the narrow contracts the routing and delivery services consume.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories only accept fully migrated connections.
//! - Absent records are `Ok(None)`, never an error.

pub mod content_repo;
pub mod directory_repo;
pub mod session;

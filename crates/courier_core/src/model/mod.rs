//! Domain model for messages, routes and the content tree they live in.
//!
//! # Responsibility
//! - Define the property-bag `Content` node shared by store and services.
//! - Give typed read access to message, settings and directory records.
//! - Own the route and route-set containers mutated by routers.
//!
//! # Invariants
//! - Content paths are absolute, `/`-separated and carry no trailing `/`
//!   (except the root itself).
//! - Property names follow the `namespace:name` convention of the store.

pub mod authorizable;
pub mod content;
pub mod message;
pub mod route;
pub mod settings;
pub mod store_path;

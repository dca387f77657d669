//! Routing and delivery use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, directory and lock calls into the message pipeline.
//! - Keep callers decoupled from storage details.

pub mod access;
pub mod delivery;
pub mod dispatcher;
pub mod messaging_service;
pub mod profile_writer;
pub mod route_resolver;
pub mod settings_lookup;
pub mod validation;

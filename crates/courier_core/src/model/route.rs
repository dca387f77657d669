//! Delivery routes and the mutable route set routers operate on.
//!
//! # Invariants
//! - A `RouteSet` never stores the same (transport, recipient) pair twice.
//! - `add`/`remove` report whether they changed the set.
//! - Iteration follows insertion order; callers must not rely on it for
//!   delivery semantics.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

/// Store-to-store copy inside the platform.
pub const TRANSPORT_INTERNAL: &str = "internal";
/// Outgoing mail.
pub const TRANSPORT_SMTP: &str = "smtp";
/// Discussion pseudo-transport.
pub const TRANSPORT_DISCUSSION: &str = "discussion";
/// Chat pseudo-transport.
pub const TRANSPORT_CHAT: &str = "chat";

static ROUTE_SPEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<transport>[A-Za-z][A-Za-z0-9_\-]*):)?(?P<recipient>\S+)$")
        .expect("valid route spec regex")
});

/// One planned delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    transport: String,
    recipient: String,
}

impl Route {
    pub fn new(transport: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            transport: transport.into().trim().to_string(),
            recipient: recipient.into().trim().to_string(),
        }
    }

    pub fn internal(recipient: impl Into<String>) -> Self {
        Self::new(TRANSPORT_INTERNAL, recipient)
    }

    /// Parses `transport:recipient` or a bare recipient (internal transport).
    ///
    /// Transport tags are case-insensitive and stored lowercase.
    /// Returns `None` for blank or whitespace-containing entries.
    pub fn parse(spec: &str) -> Option<Self> {
        let captures = ROUTE_SPEC_RE.captures(spec.trim())?;
        let recipient = captures.name("recipient")?.as_str();
        let transport = captures.name("transport").map_or_else(
            || TRANSPORT_INTERNAL.to_string(),
            |value| value.as_str().to_ascii_lowercase(),
        );
        Some(Self::new(transport, recipient))
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// An empty transport is treated as internal.
    pub fn is_internal(&self) -> bool {
        self.transport.is_empty() || self.transport == TRANSPORT_INTERNAL
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.transport, self.recipient)
    }
}

/// Ordered, duplicate-free collection of routes for one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSet {
    routes: Vec<Route>,
}

impl RouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route; returns `false` when the exact pair is already present.
    pub fn add(&mut self, route: Route) -> bool {
        if self.routes.contains(&route) {
            return false;
        }
        self.routes.push(route);
        true
    }

    /// Removes a route; returns `false` when it was not present.
    pub fn remove(&mut self, route: &Route) -> bool {
        match self.routes.iter().position(|current| current == route) {
            Some(index) => {
                self.routes.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, route: &Route) -> bool {
        self.routes.contains(route)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Snapshot of routes matching `predicate`, safe to use while mutating the set.
    pub fn matching(&self, predicate: impl Fn(&Route) -> bool) -> Vec<Route> {
        self.routes
            .iter()
            .filter(|route| predicate(route))
            .cloned()
            .collect()
    }

    pub fn into_vec(self) -> Vec<Route> {
        self.routes
    }
}

impl FromIterator<Route> for RouteSet {
    fn from_iter<T: IntoIterator<Item = Route>>(iter: T) -> Self {
        let mut set = Self::new();
        for route in iter {
            set.add(route);
        }
        set
    }
}

impl<'a> IntoIterator for &'a RouteSet {
    type Item = &'a Route;
    type IntoIter = std::slice::Iter<'a, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

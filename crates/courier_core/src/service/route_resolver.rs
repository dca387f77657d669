//! Route resolution for created messages.
//!
//! # Responsibility
//! - Turn a message's base routes into the final delivery plan.
//! - Run resolvers in an explicit, fixed order.
//!
//! # Invariants
//! - Routers never fail; problems are logged and contribute nothing.
//! - After `DiscussionRouter`, no route carries a pseudo-transport tag.
//! - Internal routes are never rewritten as pseudo-transport routes.
//! - Settings-driven routes are added before pseudo-transports are normalized.

use crate::config::CourierConfig;
use crate::model::message::Message;
use crate::model::route::{Route, RouteSet, TRANSPORT_INTERNAL, TRANSPORT_SMTP};
use crate::repo::directory_repo::Directory;
use crate::service::settings_lookup::SettingsLookup;
use log::{debug, warn};

/// Directory property naming a user's preferred transport.
pub const PROP_PREFERRED_TRANSPORT: &str = "preferredMessageTransport";
/// Directory property holding a user's email address.
pub const PROP_EMAIL: &str = "email";

/// One resolver in the routing chain.
pub trait MessageRouter {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;
    /// Adds or removes routes for `message`.
    fn route(&self, message: &Message, routes: &mut RouteSet);
}

/// Settings-driven notification routing plus pseudo-transport normalization.
pub struct DiscussionRouter<'a> {
    lookup: SettingsLookup<'a>,
    pseudo_transports: Vec<String>,
}

impl<'a> DiscussionRouter<'a> {
    pub fn new(lookup: SettingsLookup<'a>, pseudo_transports: Vec<String>) -> Self {
        Self {
            lookup,
            pseudo_transports,
        }
    }

    fn is_pseudo_transport(&self, transport: &str) -> bool {
        if transport.is_empty() || transport.eq_ignore_ascii_case(TRANSPORT_INTERNAL) {
            return false;
        }
        self.pseudo_transports
            .iter()
            .any(|candidate| candidate.trim().eq_ignore_ascii_case(transport))
    }

    fn add_notification_route(&self, message: &Message, routes: &mut RouteSet) {
        let (kind, marker) = match (message.kind(), message.marker()) {
            (Ok(Some(kind)), Ok(Some(marker))) => (kind, marker),
            (Ok(_), Ok(_)) => return,
            (Err(err), _) | (_, Err(err)) => {
                warn!(
                    "event=route_settings module=router status=skipped router=discussion message_id={} reason={}",
                    message.id(),
                    err
                );
                return;
            }
        };
        if !self.is_pseudo_transport(kind) {
            return;
        }

        match self.lookup.find_settings(marker, kind) {
            Ok(Some(settings)) => {
                if let Some(address) = settings.active_notify_address() {
                    routes.add(Route::internal(address));
                    debug!(
                        "event=route_settings module=router status=ok router=discussion message_id={} added=1",
                        message.id()
                    );
                }
            }
            Ok(None) => {}
            Err(err) => warn!(
                "event=route_settings module=router status=error router=discussion message_id={} error={}",
                message.id(),
                err
            ),
        }
    }
}

impl MessageRouter for DiscussionRouter<'_> {
    fn name(&self) -> &'static str {
        "discussion"
    }

    fn route(&self, message: &Message, routes: &mut RouteSet) {
        self.add_notification_route(message, routes);

        let pseudo = routes.matching(|route| {
            !route.is_internal() && self.is_pseudo_transport(route.transport())
        });
        for route in &pseudo {
            routes.add(Route::internal(route.recipient()));
        }
        for route in &pseudo {
            routes.remove(route);
        }
    }
}

/// Rewrites internal routes to `smtp` for users who asked for email delivery.
pub struct SmtpRouter<'a> {
    directory: &'a dyn Directory,
}

impl<'a> SmtpRouter<'a> {
    pub fn new(directory: &'a dyn Directory) -> Self {
        Self { directory }
    }

    fn email_route(&self, recipient: &str, force_smtp: bool) -> Option<Route> {
        let user = match self.directory.find_authorizable(recipient) {
            Ok(Some(user)) if !user.is_group() => user,
            Ok(_) => return None,
            Err(err) => {
                warn!("event=route_smtp module=router status=error router=smtp error={err}");
                return None;
            }
        };
        let prefers_smtp = user
            .string_property(PROP_PREFERRED_TRANSPORT)
            .is_some_and(|transport| transport.eq_ignore_ascii_case(TRANSPORT_SMTP));
        if !force_smtp && !prefers_smtp {
            return None;
        }
        match user.string_property(PROP_EMAIL) {
            Some(email) => Some(Route::new(TRANSPORT_SMTP, email)),
            None => {
                debug!("event=route_smtp module=router status=skipped router=smtp reason=no_email");
                None
            }
        }
    }
}

impl MessageRouter for SmtpRouter<'_> {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn route(&self, message: &Message, routes: &mut RouteSet) {
        let force_smtp = matches!(message.kind(), Ok(Some(kind)) if kind == TRANSPORT_SMTP);

        for route in routes.matching(Route::is_internal) {
            if let Some(replacement) = self.email_route(route.recipient(), force_smtp) {
                routes.remove(&route);
                routes.add(replacement);
            }
        }
    }
}

/// Ordered list of routers applied to one route set.
#[derive(Default)]
pub struct RouterChain<'a> {
    routers: Vec<Box<dyn MessageRouter + 'a>>,
}

impl<'a> RouterChain<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discussion routing followed by smtp preference routing.
    pub fn standard(
        lookup: SettingsLookup<'a>,
        directory: &'a dyn Directory,
        config: &CourierConfig,
    ) -> Self {
        Self::new()
            .with(DiscussionRouter::new(
                lookup,
                config.pseudo_transports.clone(),
            ))
            .with(SmtpRouter::new(directory))
    }

    /// Appends a router; routers run in insertion order.
    pub fn with(mut self, router: impl MessageRouter + 'a) -> Self {
        self.routers.push(Box::new(router));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.routers.iter().map(|router| router.name()).collect()
    }

    /// Runs every router against `routes`.
    pub fn route(&self, message: &Message, routes: &mut RouteSet) {
        for router in &self.routers {
            router.route(message, routes);
        }
        debug!(
            "event=route_resolved module=router status=ok message_id={} routes={}",
            message.id(),
            routes.len()
        );
    }
}

//! Post-creation dispatch of outbox messages.
//!
//! # Responsibility
//! - Pick up pending outbox messages and mark them notified.
//! - Build base routes, run the router chain and hand off to delivery.
//!
//! # Invariants
//! - A message is marked notified before routing, so a second dispatch of
//!   the same path is a no-op.
//! - Only `internal` routes are delivered; the rest are reported unhandled.
//! - A malformed `sakai:to` yields an empty base route set; settings-driven
//!   routes still apply.

use crate::model::content::{Content, PropertyError};
use crate::model::message::{
    Message, BOX_OUTBOX, PROP_SENDSTATE, STATE_NONE, STATE_NOTIFIED, STATE_PENDING,
};
use crate::model::route::{Route, RouteSet};
use crate::repo::content_repo::{ContentStore, StoreError};
use crate::service::delivery::{DeliveryError, DeliveryReport, InternalDelivery};
use crate::service::messaging_service::expand_aliases;
use crate::service::route_resolver::RouterChain;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum DispatchError {
    /// No node exists at the dispatched path.
    NotFound(String),
    Store(StoreError),
    /// Message node has malformed routing properties.
    Malformed { path: String, error: PropertyError },
    Delivery(DeliveryError),
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "nothing to dispatch at `{path}`"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Malformed { path, error } => write!(f, "malformed message `{path}`: {error}"),
            Self::Delivery(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Store(err) => Some(err),
            Self::Malformed { error, .. } => Some(error),
            Self::Delivery(err) => Some(err),
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<DeliveryError> for DispatchError {
    fn from(value: DeliveryError) -> Self {
        Self::Delivery(value)
    }
}

/// What happened to one dispatched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    NotAMessage,
    NotInOutbox,
    /// Send-state was neither `none` nor `pending`.
    AlreadyHandled,
    Delivered {
        /// Final route set after the router chain.
        routes: Vec<Route>,
        report: DeliveryReport,
        /// Routes on transports without a local implementation.
        unhandled: Vec<Route>,
    },
}

pub struct MessageDispatcher<'a> {
    store: &'a dyn ContentStore,
    chain: RouterChain<'a>,
    delivery: InternalDelivery<'a>,
}

impl<'a> MessageDispatcher<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        chain: RouterChain<'a>,
        delivery: InternalDelivery<'a>,
    ) -> Self {
        Self {
            store,
            chain,
            delivery,
        }
    }

    /// Dispatches the message stored at `path`.
    pub fn dispatch(&self, path: &str) -> Result<DispatchOutcome, DispatchError> {
        let content = self
            .store
            .get(path)?
            .ok_or_else(|| DispatchError::NotFound(path.to_string()))?;
        if !Message::is_message_node(&content) {
            return Ok(DispatchOutcome::NotAMessage);
        }
        let malformed = |error: PropertyError| DispatchError::Malformed {
            path: path.to_string(),
            error,
        };
        let message = Message::from_content(content).map_err(malformed)?;

        if message.message_box().map_err(malformed)? != Some(BOX_OUTBOX) {
            return Ok(DispatchOutcome::NotInOutbox);
        }
        let state = message.send_state().map_err(malformed)?;
        if state != STATE_NONE && state != STATE_PENDING {
            debug!(
                "event=dispatch module=dispatcher status=skipped message_id={} send_state={}",
                message.id(),
                state
            );
            return Ok(DispatchOutcome::AlreadyHandled);
        }

        let mut routes = RouteSet::new();
        match message.base_routes() {
            Ok(base) => {
                for route in base {
                    for recipient in expand_aliases(route.recipient()) {
                        routes.add(Route::new(route.transport(), recipient));
                    }
                }
            }
            Err(err) => warn!(
                "event=dispatch module=dispatcher status=degraded message_id={} reason={}",
                message.id(),
                err
            ),
        }

        let mut notified = Content::new(message.path());
        notified.set_property(PROP_SENDSTATE, STATE_NOTIFIED);
        self.store.update(&notified)?;

        self.chain.route(&message, &mut routes);
        let report = self.delivery.deliver(&routes, &message)?;
        let unhandled = routes.matching(|route| !route.is_internal());
        if !unhandled.is_empty() {
            warn!(
                "event=dispatch module=dispatcher status=partial message_id={} unhandled_routes={}",
                message.id(),
                unhandled.len()
            );
        }
        info!(
            "event=dispatch module=dispatcher status=ok message_id={} routes={}",
            message.id(),
            routes.len()
        );

        Ok(DispatchOutcome::Delivered {
            routes: routes.into_vec(),
            report,
            unhandled,
        })
    }

    /// Dispatches each distinct path once, in first-seen order.
    pub fn dispatch_pending<'p>(
        &self,
        paths: impl IntoIterator<Item = &'p str>,
    ) -> Vec<(String, Result<DispatchOutcome, DispatchError>)> {
        let mut seen = HashSet::new();
        paths
            .into_iter()
            .filter(|path| seen.insert(*path))
            .map(|path| (path.to_string(), self.dispatch(path)))
            .collect()
    }
}

//! Delivery access checks.
//!
//! A recipient store accepts a delivery when the store path or one of its
//! ancestors is marked public, or when the configured authorizer allows it.
//! The public-marker walk runs first.

use crate::model::content::self_and_ancestors;
use crate::model::message::Message;
use crate::repo::content_repo::StoreResult;
use crate::repo::session::AdminSession;

/// Property holding a node's coarse permission marker.
pub const PROP_PERMISSIONS: &str = "sakai:permissions";
const PUBLIC_MARKERS: [&str; 2] = ["public", "everyone"];

/// Policy oracle deciding whether `message` may be delivered to `recipient`.
pub trait DeliveryAuthorizer {
    fn is_delivery_authorized(
        &self,
        recipient: &str,
        message: &Message,
        session: &AdminSession<'_>,
    ) -> bool;
}

/// Authorizes every delivery.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthorizer;

impl DeliveryAuthorizer for AllowAllAuthorizer {
    fn is_delivery_authorized(&self, _: &str, _: &Message, _: &AdminSession<'_>) -> bool {
        true
    }
}

/// Authorizes deliveries to identities known to the directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct KnownRecipientAuthorizer;

impl DeliveryAuthorizer for KnownRecipientAuthorizer {
    fn is_delivery_authorized(
        &self,
        recipient: &str,
        _message: &Message,
        session: &AdminSession<'_>,
    ) -> bool {
        match session.directory().find_authorizable(recipient) {
            Ok(found) => found.is_some(),
            Err(err) => {
                log::warn!("event=access_check module=access status=error error={err}");
                false
            }
        }
    }
}

/// Walks from `path` to the root looking for a public permission marker.
pub fn has_public_marker(path: &str, session: &AdminSession<'_>) -> StoreResult<bool> {
    for candidate in self_and_ancestors(path) {
        let Some(node) = session.content().get(candidate)? else {
            continue;
        };
        let marker = node
            .string_property(PROP_PERMISSIONS)
            .ok()
            .flatten()
            .map(str::trim);
        if marker.is_some_and(|value| {
            PUBLIC_MARKERS
                .iter()
                .any(|public| value.eq_ignore_ascii_case(public))
        }) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::has_public_marker;
    use crate::db::open_db_in_memory;
    use crate::model::content::Content;
    use crate::repo::content_repo::ContentStore;
    use crate::repo::session::{SessionProvider, SqliteRepository};

    #[test]
    fn public_marker_on_ancestor_is_found() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteRepository::try_new(&conn).unwrap();
        let mut root = Content::new("/_messages");
        root.set_property("sakai:permissions", "Everyone");
        repo.content().update(&root).unwrap();

        let session = repo.login_administrative().unwrap();
        assert!(has_public_marker("/_messages/ab/cd/alice/message", &session).unwrap());
        assert!(!has_public_marker("/private/alice", &session).unwrap());
    }
}

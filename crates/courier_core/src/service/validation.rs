//! Pre-validation of message-creation requests.

use crate::model::message::{PROP_MARKER, PROP_REPLY_ON};
use crate::service::messaging_service::MessagingError;
use crate::service::settings_lookup::SettingsLookup;
use std::collections::BTreeMap;

/// Checks correlation parameters before a message is created.
pub struct CreateMessageValidator<'a> {
    lookup: SettingsLookup<'a>,
}

impl<'a> CreateMessageValidator<'a> {
    pub fn new(lookup: SettingsLookup<'a>) -> Self {
        Self { lookup }
    }

    /// Validates `params` for a message created under `base_path`.
    ///
    /// # Errors
    /// - 400 when the marker is missing or blank.
    /// - 400 when a reply-on reference does not resolve under `base_path`.
    /// - 500 when the reply-on lookup itself fails.
    pub fn check_request(
        &self,
        params: &BTreeMap<String, String>,
        base_path: &str,
    ) -> Result<(), MessagingError> {
        let marker = params
            .get(PROP_MARKER)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                MessagingError::bad_request(format!("the {PROP_MARKER} parameter is required"))
            })?;

        let Some(reply_on) = params
            .get(PROP_REPLY_ON)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
        else {
            return Ok(());
        };

        match self.lookup.find_message(reply_on, marker, base_path) {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(MessagingError::bad_request(format!(
                "the {PROP_REPLY_ON} parameter does not reference an existing message"
            ))),
            Err(err) => {
                log::error!("event=check_request module=validation status=error error={err}");
                Err(MessagingError::internal(format!(
                    "unable to resolve {PROP_REPLY_ON}: {err}"
                )))
            }
        }
    }
}

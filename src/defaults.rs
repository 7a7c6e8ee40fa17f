//! Consolidation of the channels that notify every alert by default.
//!
//! The default channels collapse into the receiver behind the root route.
//! A single default channel is routed to directly under its own name; two or
//! more are merged into one synthetic receiver.

use crate::config::{ALERT_NAME_LABEL, DEFAULT_RECEIVER_NAME, FOLDER_TITLE_LABEL};
use crate::core::{LegacyChannel, Receiver};
use crate::error::MigrationResult;
use crate::receivers::integration_from_channel;
use crate::routes::Route;
use std::collections::BTreeSet;
use tracing::debug;

/// Names of the receivers the root route already notifies.
pub type DefaultReceivers = BTreeSet<String>;

/// Creates the root route and, when one is needed, its synthetic receiver.
///
/// # Returns
/// * `Ok((None, route))` for exactly one default channel, routed by its own name
/// * `Ok((Some(receiver), route))` otherwise, where the receiver is named
///   [`DEFAULT_RECEIVER_NAME`] and holds one integration per default channel
///   in input order (none when there are no default channels)
pub fn create_default_route_and_receiver(
    default_channels: &[&LegacyChannel],
) -> MigrationResult<(Option<Receiver>, Route)> {
    let (receiver, receiver_name) = match default_channels {
        [only] => (None, only.name.clone()),
        _ => {
            let integrations = default_channels
                .iter()
                .map(|channel| integration_from_channel(channel))
                .collect::<MigrationResult<Vec<_>>>()?;
            debug!(
                integrations = integrations.len(),
                "Consolidated default channels into {}", DEFAULT_RECEIVER_NAME
            );
            let receiver = Receiver {
                name: DEFAULT_RECEIVER_NAME.to_string(),
                integrations,
            };
            (Some(receiver), DEFAULT_RECEIVER_NAME.to_string())
        }
    };

    let route = Route {
        receiver: receiver_name,
        matchers: Vec::new(),
        continue_matching: false,
        routes: Vec::new(),
        group_by: Some(vec![
            FOLDER_TITLE_LABEL.to_string(),
            ALERT_NAME_LABEL.to_string(),
        ]),
    };

    Ok((receiver, route))
}

/// Collects the receiver names of the default channels.
pub fn default_receiver_names(default_channels: &[&LegacyChannel]) -> DefaultReceivers {
    default_channels
        .iter()
        .map(|channel| channel.name.clone())
        .collect()
}

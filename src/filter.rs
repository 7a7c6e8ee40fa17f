//! Per-alert receiver selection against the organization's defaults.

use crate::core::ChannelKey;
use crate::defaults::DefaultReceivers;
use crate::error::MigrationResult;
use crate::receivers::MigrationIndex;
use crate::routes::resolve_receiver;
use std::collections::BTreeSet;

/// The receivers a migrated alert has to be routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverSelection {
    /// The root route already notifies everything the alert needs.
    UseDefault,
    /// The alert needs an explicit contact label naming these receivers.
    Explicit(BTreeSet<String>),
}

/// Determines which receivers an alert must name explicitly.
///
/// Channel references resolve through the index, so a channel referenced by
/// uid and by numeric id counts once. When every resolved receiver is already
/// a default one the alert defers to the root route. Otherwise the defaults
/// are added to the alert's own receivers, because an alert routed through
/// the child routes no longer reaches the root receiver.
pub fn filter_receivers_for_alert(
    alert_id: i64,
    channel_keys: &[ChannelKey],
    index: &MigrationIndex,
    default_receivers: &DefaultReceivers,
) -> MigrationResult<ReceiverSelection> {
    let mut names = BTreeSet::new();
    for key in channel_keys {
        let receiver = resolve_receiver(alert_id, key, index)?;
        names.insert(receiver.name.clone());
    }

    if names.is_subset(default_receivers) {
        return Ok(ReceiverSelection::UseDefault);
    }

    names.extend(default_receivers.iter().cloned());
    Ok(ReceiverSelection::Explicit(names))
}

//! Conversion of legacy notification channels into receivers.
//!
//! Every channel becomes one receiver holding a single integration. The
//! resulting [`MigrationIndex`] resolves a channel by uid and by numeric id
//! to the same shared receiver value.

use crate::core::{ChannelKey, Integration, LegacyChannel, Receiver};
use crate::error::{MigrationError, MigrationResult};
use rand::{distr::Alphanumeric, Rng};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, instrument};

/// Legacy notifier ids whose integration is registered under another name.
/// Every other notifier type is carried over unchanged.
pub const RENAMED_NOTIFIER_TYPES: &[(&str, &str)] = &[
    ("LINE", "line"),
    ("prometheus-alertmanager", "alertmanager"),
];

const INTEGRATION_UID_LENGTH: usize = 9;

/// Maps every channel key to the receiver migrated from that channel.
#[derive(Debug, Default, Clone)]
pub struct MigrationIndex {
    by_key: HashMap<ChannelKey, Rc<Receiver>>,
    receivers: Vec<Rc<Receiver>>,
}

impl MigrationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a receiver under all of the given keys.
    ///
    /// Fails if any key is already taken, leaving the index unchanged.
    pub fn insert(&mut self, keys: &[ChannelKey], receiver: Receiver) -> MigrationResult<()> {
        if let Some(key) = keys.iter().find(|key| self.by_key.contains_key(*key)) {
            return Err(MigrationError::DuplicateChannelKey { key: key.clone() });
        }
        let receiver = Rc::new(receiver);
        for key in keys {
            self.by_key.insert(key.clone(), Rc::clone(&receiver));
        }
        self.receivers.push(receiver);
        Ok(())
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&Rc<Receiver>> {
        self.by_key.get(key)
    }

    /// The distinct receivers, in the order their channels were processed.
    pub fn receivers(&self) -> &[Rc<Receiver>] {
        &self.receivers
    }

    /// Number of keys, counting both forms of a channel separately.
    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }
}

/// Builds one receiver per channel and indexes it under the channel's keys.
///
/// # Returns
/// * `Ok(MigrationIndex)` holding every channel's receiver
/// * `Err` on the first channel that cannot be converted or whose name or
///   keys collide with an earlier channel; nothing is returned in that case
#[instrument(skip_all, fields(channels = channels.len()))]
pub fn build_receivers(channels: &[LegacyChannel]) -> MigrationResult<MigrationIndex> {
    let mut index = MigrationIndex::new();
    let mut names = HashSet::new();

    for channel in channels {
        let integration = integration_from_channel(channel)?;
        if !names.insert(channel.name.clone()) {
            return Err(MigrationError::DuplicateReceiverName {
                name: channel.name.clone(),
            });
        }

        let receiver = Receiver {
            name: channel.name.clone(),
            integrations: vec![integration],
        };
        index.insert(&channel.keys(), receiver)?;
        debug!(channel_id = channel.id, name = %channel.name, "Migrated channel to receiver");
    }

    Ok(index)
}

/// Derives an integration from a legacy channel.
///
/// Settings and secure settings are copied verbatim. A `null` settings
/// payload is treated as an empty object; any other non-object payload is
/// rejected.
pub fn integration_from_channel(channel: &LegacyChannel) -> MigrationResult<Integration> {
    if channel.name.trim().is_empty() {
        return Err(MigrationError::conversion(
            format!("#{}", channel.id),
            "channel has an empty name",
        ));
    }
    let settings = match &channel.settings {
        Value::Null => Value::Object(Map::new()),
        Value::Object(_) => channel.settings.clone(),
        other => {
            return Err(MigrationError::conversion(
                &channel.name,
                format!("settings must be an object, got {}", json_type_name(other)),
            ))
        }
    };

    Ok(Integration {
        uid: new_integration_uid(),
        name: channel.name.clone(),
        kind: integration_type(&channel.kind).to_string(),
        disable_resolve_message: channel.disable_resolve_message,
        settings,
        secure_settings: channel.secure_settings.clone(),
    })
}

/// Maps a legacy notifier id to the type of its integration.
pub fn integration_type(notifier_type: &str) -> &str {
    RENAMED_NOTIFIER_TYPES
        .iter()
        .find(|(legacy, _)| *legacy == notifier_type)
        .map(|(_, renamed)| *renamed)
        .unwrap_or(notifier_type)
}

/// Mints a short random identifier for an integration.
pub fn new_integration_uid() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(INTEGRATION_UID_LENGTH)
        .map(char::from)
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

//! Core domain types and collaborator traits for the migration
//!
//! This module defines the legacy records read from the old alerting schema,
//! the receiver and integration types written to the unified configuration,
//! and the trait contracts for the stores that bound a migration run.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies a legacy notification channel.
///
/// Legacy alerts reference their channels either by the channel's stable uid
/// or, for alerts created before uids existed, by its numeric database id.
/// Both forms of the same channel resolve to the same receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelKey {
    Uid(String),
    Id(i64),
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKey::Uid(uid) => write!(f, "uid:{}", uid),
            ChannelKey::Id(id) => write!(f, "id:{}", id),
        }
    }
}

impl From<&str> for ChannelKey {
    fn from(uid: &str) -> Self {
        ChannelKey::Uid(uid.to_string())
    }
}

impl From<String> for ChannelKey {
    fn from(uid: String) -> Self {
        ChannelKey::Uid(uid)
    }
}

impl From<i64> for ChannelKey {
    fn from(id: i64) -> Self {
        ChannelKey::Id(id)
    }
}

/// A notification target from the legacy schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LegacyChannel {
    /// Stable identifier; absent on channels created by very old versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Numeric database identifier, always present.
    pub id: i64,
    /// Display name, which becomes the receiver name.
    pub name: String,
    /// Notifier type, e.g. "email" or "slack".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub disable_resolve_message: bool,
    /// Type-specific settings payload.
    #[serde(default)]
    pub settings: serde_json::Value,
    /// Sensitive settings, already decrypted by the legacy store.
    #[serde(default)]
    pub secure_settings: BTreeMap<String, String>,
}

impl LegacyChannel {
    /// Returns every key this channel can be referenced by.
    pub fn keys(&self) -> Vec<ChannelKey> {
        let mut keys = Vec::with_capacity(2);
        if let Some(uid) = self.uid.as_deref().filter(|uid| !uid.is_empty()) {
            keys.push(ChannelKey::Uid(uid.to_string()));
        }
        keys.push(ChannelKey::Id(self.id));
        keys
    }
}

/// A legacy dashboard alert and the channels it notifies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LegacyAlert {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Channel references in the order they were configured.
    #[serde(default)]
    pub channels: Vec<ChannelKey>,
}

/// A single notification integration inside a receiver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Integration {
    /// Freshly minted identifier, unrelated to the legacy channel uid.
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub disable_resolve_message: bool,
    pub settings: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secure_settings: BTreeMap<String, String>,
}

/// A named group of notification integrations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receiver {
    pub name: String,
    pub integrations: Vec<Integration>,
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Read-only access to the legacy alerting tables.
pub trait LegacyStore {
    /// Returns the organizations that have legacy alerting data.
    fn org_ids(&self) -> Result<Vec<i64>>;

    /// Fetches all notification channels of an organization, in id order.
    fn fetch_legacy_channels(&self, org_id: i64) -> Result<Vec<LegacyChannel>>;

    /// Fetches all dashboard alerts of an organization with their channel references.
    fn fetch_legacy_alerts(&self, org_id: i64) -> Result<Vec<LegacyAlert>>;
}

/// Write-only sink for the migrated configuration.
pub trait ConfigStore {
    /// Persists every organization's configuration as one unit.
    ///
    /// # Returns
    /// * `Ok(())` if all configurations were written
    /// * `Err` if nothing could be written; implementations must not leave
    ///   a partial result behind
    fn commit(&self, configs: &[crate::migration::OrgConfig]) -> Result<()>;
}

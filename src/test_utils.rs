//! Fixtures and an in-memory store for exercising the migration in tests.

use crate::core::{ChannelKey, ConfigStore, LegacyAlert, LegacyChannel, LegacyStore};
use crate::migration::OrgConfig;
use anyhow::Result;
use serde_json::json;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Creates an email channel with the given identifiers and empty settings.
pub fn channel(uid: &str, id: i64, name: &str) -> LegacyChannel {
    LegacyChannel {
        uid: Some(uid.to_string()),
        id,
        name: name.to_string(),
        kind: "email".to_string(),
        settings: json!({}),
        ..Default::default()
    }
}

/// Creates a channel flagged to notify every alert by default.
pub fn default_channel(uid: &str, id: i64, name: &str) -> LegacyChannel {
    LegacyChannel {
        is_default: true,
        ..channel(uid, id, name)
    }
}

/// Creates a legacy alert referencing the given channels.
pub fn alert(id: i64, channels: Vec<ChannelKey>) -> LegacyAlert {
    LegacyAlert {
        id,
        name: format!("alert-{}", id),
        channels,
    }
}

/// An in-memory legacy store and configuration sink.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub channels: BTreeMap<i64, Vec<LegacyChannel>>,
    pub alerts: BTreeMap<i64, Vec<LegacyAlert>>,
    pub committed: RefCell<Option<Vec<OrgConfig>>>,
    pub fail_commit: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_org(mut self, org_id: i64, channels: Vec<LegacyChannel>, alerts: Vec<LegacyAlert>) -> Self {
        self.channels.insert(org_id, channels);
        self.alerts.insert(org_id, alerts);
        self
    }

    pub fn committed(&self) -> Option<Vec<OrgConfig>> {
        self.committed.borrow().clone()
    }
}

impl LegacyStore for MemoryStore {
    fn org_ids(&self) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self.channels.keys().chain(self.alerts.keys()).copied().collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn fetch_legacy_channels(&self, org_id: i64) -> Result<Vec<LegacyChannel>> {
        Ok(self.channels.get(&org_id).cloned().unwrap_or_default())
    }

    fn fetch_legacy_alerts(&self, org_id: i64) -> Result<Vec<LegacyAlert>> {
        Ok(self.alerts.get(&org_id).cloned().unwrap_or_default())
    }
}

impl ConfigStore for MemoryStore {
    fn commit(&self, configs: &[OrgConfig]) -> Result<()> {
        if self.fail_commit {
            anyhow::bail!("simulated commit failure");
        }
        *self.committed.borrow_mut() = Some(configs.to_vec());
        Ok(())
    }
}

//! The migration run, decoupled from the entry point.
//!
//! A run reads every organization's legacy channels and alerts, builds the
//! receivers and routing tree purely in memory, validates the result and
//! commits all organizations at once. Fatal errors abort before anything is
//! written; alerts referencing unknown channels are skipped and reported.

use crate::config::{MigrationConfig, CONTACT_LABEL};
use crate::core::{ConfigStore, LegacyAlert, LegacyChannel, LegacyStore, Receiver};
use crate::defaults::{create_default_route_and_receiver, default_receiver_names};
use crate::error::{MigrationError, MigrationResult};
use crate::filter::{filter_receivers_for_alert, ReceiverSelection};
use crate::receivers::build_receivers;
use crate::routes::{contact_label_value, create_route, Route};
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{info, instrument, warn};

/// A migrated alert rule and the labels that route it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigratedAlert {
    pub alert_id: i64,
    pub name: String,
    /// Empty when the alert is handled by the root route alone.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// The receivers the alert is expected to reach through the routing tree.
    pub receivers: Vec<String>,
}

/// An alert left out of the migration, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedAlert {
    pub org_id: i64,
    pub alert_id: i64,
    pub reason: String,
}

/// The unified notification configuration of one organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgConfig {
    pub org_id: i64,
    pub receivers: Vec<Receiver>,
    pub route: Route,
    pub alerts: Vec<MigratedAlert>,
}

impl OrgConfig {
    /// Checks that the routing tree is executable and delivers every
    /// migrated alert to exactly the receivers it was migrated with.
    pub fn validate(&self) -> MigrationResult<()> {
        let mut names = HashSet::new();
        for receiver in &self.receivers {
            if !names.insert(receiver.name.as_str()) {
                return Err(MigrationError::DuplicateReceiverName {
                    name: receiver.name.clone(),
                });
            }
        }

        if self.route.receiver.is_empty() {
            return Err(MigrationError::InvalidConfiguration(
                "root route has no receiver".to_string(),
            ));
        }

        let mut problems = Vec::new();
        self.route.walk(&mut |route| {
            if !route.receiver.is_empty() && !names.contains(route.receiver.as_str()) {
                problems.push(format!("route references unknown receiver '{}'", route.receiver));
            }
        });
        if let Some(problem) = problems.into_iter().next() {
            return Err(MigrationError::InvalidConfiguration(problem));
        }

        let tree = self.route.compile()?;
        for alert in &self.alerts {
            let routed: BTreeSet<&str> = tree.matching_receivers(&alert.labels).into_iter().collect();
            let expected: BTreeSet<&str> = alert.receivers.iter().map(String::as_str).collect();
            if routed != expected {
                return Err(MigrationError::InvalidConfiguration(format!(
                    "alert {} routes to {:?} instead of {:?}",
                    alert.alert_id, routed, expected
                )));
            }
        }

        Ok(())
    }

    /// A digest of the configuration that ignores minted integration uids.
    pub fn fingerprint(&self) -> MigrationResult<String> {
        let mut normalized = self.clone();
        for receiver in &mut normalized.receivers {
            for integration in &mut receiver.integrations {
                integration.uid.clear();
            }
        }
        let bytes = serde_json::to_vec(&normalized)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

/// The result of a migration run, presented to the operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationOutcome {
    /// RFC 3339 timestamp of when the run started.
    pub started_at: String,
    pub configs: Vec<OrgConfig>,
    pub skipped: Vec<SkippedAlert>,
    /// False for dry runs.
    pub committed: bool,
}

/// Migrates the channels and alerts of one organization.
///
/// # Returns
/// * `Ok((config, skipped))` with the configuration of every alert that
///   could be migrated and a report of those that could not
/// * `Err` on any fatal error; no configuration is produced in that case
#[instrument(skip(channels, alerts), fields(channels = channels.len(), alerts = alerts.len()))]
pub fn migrate_org(
    org_id: i64,
    channels: &[LegacyChannel],
    alerts: &[LegacyAlert],
) -> MigrationResult<(OrgConfig, Vec<SkippedAlert>)> {
    let index = build_receivers(channels)?;

    let default_channels: Vec<&LegacyChannel> = channels.iter().filter(|c| c.is_default).collect();
    let default_receivers = default_receiver_names(&default_channels);
    let (default_receiver, mut route) = create_default_route_and_receiver(&default_channels)?;

    let mut receivers: Vec<Receiver> = index
        .receivers()
        .iter()
        .map(|receiver| Receiver::clone(receiver))
        .collect();
    if let Some(default_receiver) = default_receiver {
        if receivers.iter().any(|r| r.name == default_receiver.name) {
            return Err(MigrationError::DuplicateReceiverName {
                name: default_receiver.name,
            });
        }
        receivers.push(default_receiver);
    }

    let mut migrated = Vec::with_capacity(alerts.len());
    let mut skipped = Vec::new();
    let mut routed_receivers = HashSet::new();

    for alert in alerts {
        match filter_receivers_for_alert(alert.id, &alert.channels, &index, &default_receivers) {
            Ok(ReceiverSelection::UseDefault) => migrated.push(MigratedAlert {
                alert_id: alert.id,
                name: alert.name.clone(),
                labels: BTreeMap::new(),
                receivers: vec![route.receiver.clone()],
            }),
            Ok(ReceiverSelection::Explicit(names)) => {
                let mut labels = BTreeMap::new();
                labels.insert(CONTACT_LABEL.to_string(), contact_label_value(&names));
                routed_receivers.extend(names.iter().cloned());
                migrated.push(MigratedAlert {
                    alert_id: alert.id,
                    name: alert.name.clone(),
                    labels,
                    receivers: names.into_iter().collect(),
                });
            }
            Err(e) if !e.is_fatal() => {
                warn!(org_id, alert_id = alert.id, error = %e, "Skipping alert");
                skipped.push(SkippedAlert {
                    org_id,
                    alert_id: alert.id,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    // Only receivers some alert is labelled with need a child route.
    for receiver in &receivers {
        if routed_receivers.contains(&receiver.name) {
            route.routes.push(create_route(receiver)?);
        }
    }

    info!(
        org_id,
        receivers = receivers.len(),
        routes = route.routes.len(),
        migrated = migrated.len(),
        skipped = skipped.len(),
        "Organization migrated"
    );

    let config = OrgConfig {
        org_id,
        receivers,
        route,
        alerts: migrated,
    };
    Ok((config, skipped))
}

/// Drives a migration run between a legacy store and a configuration store.
pub struct Migrator {
    config: MigrationConfig,
}

impl Migrator {
    pub fn new(config: MigrationConfig) -> Self {
        Self { config }
    }

    /// Runs the migration for every configured organization.
    ///
    /// Nothing is committed unless every organization migrated and validated
    /// without a fatal error.
    #[instrument(skip_all, fields(dry_run = self.config.dry_run))]
    pub fn run(&self, legacy: &dyn LegacyStore, sink: &dyn ConfigStore) -> MigrationResult<MigrationOutcome> {
        let started_at = Utc::now().to_rfc3339();
        let org_ids = if self.config.org_ids.is_empty() {
            legacy.org_ids().context("failed to list organizations")?
        } else {
            self.config.org_ids.clone()
        };
        info!("Migrating {} organizations", org_ids.len());

        let mut configs = Vec::with_capacity(org_ids.len());
        let mut skipped = Vec::new();
        for org_id in org_ids {
            let channels = legacy
                .fetch_legacy_channels(org_id)
                .with_context(|| format!("failed to fetch notification channels of org {}", org_id))?;
            let alerts = legacy
                .fetch_legacy_alerts(org_id)
                .with_context(|| format!("failed to fetch alerts of org {}", org_id))?;

            let (config, org_skipped) = migrate_org(org_id, &channels, &alerts)?;
            config.validate()?;

            metrics::counter!("migration_receivers_created").increment(config.receivers.len() as u64);
            metrics::counter!("migration_alerts_migrated").increment(config.alerts.len() as u64);
            metrics::counter!("migration_alerts_skipped").increment(org_skipped.len() as u64);

            configs.push(config);
            skipped.extend(org_skipped);
        }

        if self.config.fail_on_skipped_alerts && !skipped.is_empty() {
            return Err(MigrationError::SkippedAlerts(skipped.len()));
        }

        let committed = if self.config.dry_run {
            info!("Dry run, configuration not committed");
            false
        } else {
            sink.commit(&configs)
                .context("failed to commit migrated configuration")?;
            info!("Committed configuration for {} organizations", configs.len());
            true
        };

        Ok(MigrationOutcome {
            started_at,
            configs,
            skipped,
            committed,
        })
    }
}

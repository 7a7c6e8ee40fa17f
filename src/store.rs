//! File-backed implementations of the legacy store and configuration sink.
//!
//! The legacy store reads an export of the legacy alerting tables, grouped by
//! organization. The configuration sink writes every organization's migrated
//! configuration into one document and moves it into place with a rename, so
//! a failed run never leaves a partial file behind.

use crate::config::OutputFormat;
use crate::core::{ConfigStore, LegacyAlert, LegacyChannel, LegacyStore};
use crate::migration::OrgConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The on-disk shape of a legacy alerting export.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LegacyExport {
    #[serde(default)]
    pub orgs: Vec<LegacyOrg>,
}

/// One organization's legacy channels and alerts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LegacyOrg {
    pub org_id: i64,
    #[serde(default)]
    pub channels: Vec<LegacyChannel>,
    #[serde(default)]
    pub alerts: Vec<LegacyAlert>,
}

/// Reads legacy channels and alerts from a YAML or JSON export.
#[derive(Debug, Clone)]
pub struct FileLegacyStore {
    export: LegacyExport,
}

impl FileLegacyStore {
    /// Loads the export at `path`. Files ending in `.json` are parsed as
    /// JSON, anything else as YAML.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read legacy export: {}", path.display()))?;

        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        let export: LegacyExport = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON from legacy export: {}", path.display()))?
        } else {
            serde_yml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML from legacy export: {}", path.display()))?
        };

        info!(
            "Loaded legacy export with {} organizations from {}",
            export.orgs.len(),
            path.display()
        );
        Ok(Self::from_export(export))
    }

    pub fn from_export(export: LegacyExport) -> Self {
        Self { export }
    }

    fn org(&self, org_id: i64) -> Option<&LegacyOrg> {
        self.export.orgs.iter().find(|org| org.org_id == org_id)
    }
}

impl LegacyStore for FileLegacyStore {
    fn org_ids(&self) -> Result<Vec<i64>> {
        Ok(self.export.orgs.iter().map(|org| org.org_id).collect())
    }

    fn fetch_legacy_channels(&self, org_id: i64) -> Result<Vec<LegacyChannel>> {
        let org = self
            .org(org_id)
            .with_context(|| format!("organization {} not found in legacy export", org_id))?;
        Ok(org.channels.clone())
    }

    fn fetch_legacy_alerts(&self, org_id: i64) -> Result<Vec<LegacyAlert>> {
        Ok(self.org(org_id).map(|org| org.alerts.clone()).unwrap_or_default())
    }
}

/// The on-disk shape of the migrated configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigratedDocument {
    pub orgs: Vec<OrgConfig>,
}

/// Writes the migrated configuration to a single file.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
    format: OutputFormat,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Serializes the document in the configured format.
    pub fn render(&self, configs: &[OrgConfig]) -> Result<String> {
        let document = MigratedDocument {
            orgs: configs.to_vec(),
        };
        let rendered = match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&document)?,
            OutputFormat::Yaml => serde_yml::to_string(&document)?,
        };
        Ok(rendered)
    }

    fn staging_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "alertmigrate".to_string());
        self.path.with_file_name(format!(".{}.tmp", file_name))
    }
}

impl ConfigStore for FileConfigStore {
    fn commit(&self, configs: &[OrgConfig]) -> Result<()> {
        let rendered = self.render(configs)?;
        let staging = self.staging_path();

        fs::write(&staging, rendered)
            .with_context(|| format!("Failed to write staging file: {}", staging.display()))?;
        if let Err(e) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(e).with_context(|| {
                format!("Failed to move configuration into place: {}", self.path.display())
            });
        }

        debug!(format = %self.format, "Wrote {}", self.path.display());
        Ok(())
    }
}

/// Loads a previously written configuration document.
pub fn load_document<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<MigratedDocument> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration: {}", path.display()))?;
    let document = match format {
        OutputFormat::Json => serde_json::from_str(&content)?,
        OutputFormat::Yaml => serde_yml::from_str(&content)?,
    };
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChannelKey;
    use crate::migration::migrate_org;
    use crate::test_utils::{alert, channel};
    use std::io::Write;
    use tempfile::{tempdir, Builder};

    #[test]
    fn test_yaml_export_accepts_both_reference_forms() {
        let yaml = r#"
orgs:
  - org_id: 3
    channels:
      - uid: ops
        id: 1
        name: Ops
        type: email
        is_default: true
        settings:
          addresses: ops@example.com
      - id: 2
        name: Pager
        type: pagerduty
        secure_settings:
          integrationKey: abc
    alerts:
      - id: 10
        name: CPU
        channels: [ops, 2]
"#;
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(file, "{}", yaml).unwrap();

        let store = FileLegacyStore::open(file.path()).unwrap();

        assert_eq!(store.org_ids().unwrap(), vec![3]);
        let channels = store.fetch_legacy_channels(3).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "Ops");
        assert!(channels[0].is_default);
        assert_eq!(channels[1].uid, None);
        assert_eq!(channels[1].secure_settings["integrationKey"], "abc");

        let alerts = store.fetch_legacy_alerts(3).unwrap();
        assert_eq!(
            alerts[0].channels,
            vec![ChannelKey::Uid("ops".to_string()), ChannelKey::Id(2)]
        );
    }

    #[test]
    fn test_missing_org_is_an_error() {
        let store = FileLegacyStore::from_export(LegacyExport::default());
        assert!(store.fetch_legacy_channels(1).is_err());
        assert!(store.fetch_legacy_alerts(1).unwrap().is_empty());
    }

    #[test]
    fn test_commit_writes_a_readable_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alertmanager.yaml");
        let (config, _) = migrate_org(
            1,
            &[channel("a", 1, "pager")],
            &[alert(1, vec![ChannelKey::from("a")])],
        )
        .unwrap();

        for format in [OutputFormat::Yaml, OutputFormat::Json] {
            let store = FileConfigStore::new(&path, format);
            store.commit(&[config.clone()]).unwrap();

            let document = load_document(&path, format).unwrap();
            assert_eq!(document.orgs, vec![config.clone()]);
            assert!(!store.staging_path().exists());
        }

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw["orgs"][0]["route"]["routes"][0]["object_matchers"],
            serde_json::json!([["__contacts__", "=~", r#".*"pager".*"#]])
        );
    }

    #[test]
    fn test_commit_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        let store = FileConfigStore::new(&path, OutputFormat::Json);
        assert!(store.commit(&[]).is_err());
        assert!(!path.exists());
    }
}

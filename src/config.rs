//! Configuration management for the migration
//!
//! This module defines the main `Config` struct and its sub-structs, together
//! with the well-known names shared by every stage of the migration. It uses
//! the `figment` crate to layer defaults, an optional `alertmigrate.toml`
//! file, `ALERTMIGRATE_` environment variables and command-line arguments.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Name of the synthetic receiver behind the root route.
pub const DEFAULT_RECEIVER_NAME: &str = "autogen-contact-point-default";

/// Label whose value lists the receivers a migrated alert routes to.
pub const CONTACT_LABEL: &str = "__contacts__";

/// Label carrying the title of the folder an alert rule lives in.
pub const FOLDER_TITLE_LABEL: &str = "grafana_folder";

/// Label carrying the alert rule name.
pub const ALERT_NAME_LABEL: &str = "alertname";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Where the legacy alerting export is read from.
    pub input: InputConfig,
    /// Where the migrated configuration is written to.
    pub output: OutputConfig,
    /// Behaviour of the migration run itself.
    pub migration: MigrationConfig,
}

/// Configuration for the legacy data source.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct InputConfig {
    /// Path to the YAML or JSON export of the legacy alerting tables.
    pub path: Option<PathBuf>,
}

/// The serialization format of the migrated configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// Configuration for the migrated configuration sink.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OutputConfig {
    /// Destination file of the migrated configuration.
    pub path: Option<PathBuf>,
    /// The format to write the configuration in.
    pub format: OutputFormat,
}

/// Configuration for the migration run.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct MigrationConfig {
    /// Organizations to migrate. Empty means every organization in the input.
    #[serde(default)]
    pub org_ids: Vec<i64>,
    /// Build and validate the configuration without committing it.
    #[serde(default)]
    pub dry_run: bool,
    /// Abort the run instead of reporting alerts that could not be migrated.
    #[serde(default)]
    pub fail_on_skipped_alerts: bool,
}

impl Config {
    /// Loads the configuration by layering defaults, the config file, the
    /// environment and finally the command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            // Allow overriding with environment variables, e.g., ALERTMIGRATE_MIGRATION__DRY_RUN=true
            .merge(Env::prefixed("ALERTMIGRATE_").split("__"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            input: InputConfig { path: None },
            output: OutputConfig {
                path: None,
                format: OutputFormat::Json,
            },
            migration: MigrationConfig::default(),
        }
    }
}

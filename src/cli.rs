//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `alertmigrate.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Migrates legacy alert notification channels into receivers and a routing tree.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the legacy alerting export (YAML or JSON).
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Path the migrated configuration is written to.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Organization to migrate. May be repeated.
    #[arg(long = "org", value_name = "ID")]
    pub org_ids: Vec<i64>,

    /// Build and validate the configuration without writing it.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(path) = &self.input {
            let mut input = Dict::new();
            input.insert("path".into(), Value::from(path.display().to_string()));
            dict.insert("input".into(), Value::Dict(Tag::Default, input));
        }

        if let Some(path) = &self.output {
            let mut output = Dict::new();
            output.insert("path".into(), Value::from(path.display().to_string()));
            dict.insert("output".into(), Value::Dict(Tag::Default, output));
        }

        // Flags only override when set, so `--dry-run` absent keeps the file value.
        let mut migration = Dict::new();
        if !self.org_ids.is_empty() {
            migration.insert("org_ids".into(), Value::from(self.org_ids.clone()));
        }
        if self.dry_run {
            migration.insert("dry_run".into(), Value::from(true));
        }
        if !migration.is_empty() {
            dict.insert("migration".into(), Value::Dict(Tag::Default, migration));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

//! alertmigrate - Legacy notification channel migration
//!
//! Reads an export of the legacy alerting tables, migrates every organization
//! and writes the resulting receivers and routing tree in one step.

use alertmigrate::{
    cli::Cli,
    config::Config,
    formatting::{JsonFormatter, PlainTextFormatter, ReportFormatter},
    migration::Migrator,
    store::{FileConfigStore, FileLegacyStore},
};
use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            // Initialize a default logger for this specific error
            let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).try_init();
            error!("Failed to load configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Migration failed: {:#}", err);
            println!("FAIL: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    let input = config
        .input
        .path
        .clone()
        .context("an input path is required (--input or [input] path)")?;
    info!("Input: {}", input.display());
    match &config.output.path {
        Some(path) => info!("Output: {} ({})", path.display(), config.output.format),
        None => info!("Output: none"),
    }
    if config.migration.org_ids.is_empty() {
        info!("Organizations: all");
    } else {
        info!("Organizations: {:?}", config.migration.org_ids);
    }
    info!("Dry Run: {}", config.migration.dry_run);
    info!(
        "Fail On Skipped Alerts: {}",
        config.migration.fail_on_skipped_alerts
    );
    info!("-------------------------------------------------------");

    let output = match (&config.output.path, config.migration.dry_run) {
        (Some(path), _) => path.clone(),
        (None, true) => Default::default(),
        (None, false) => anyhow::bail!("an output path is required unless --dry-run is set"),
    };

    let legacy = FileLegacyStore::open(&input)?;
    let sink = FileConfigStore::new(output, config.output.format);
    let outcome = Migrator::new(config.migration.clone()).run(&legacy, &sink)?;

    let formatter: Box<dyn ReportFormatter> = if cli.json {
        Box::new(JsonFormatter)
    } else {
        Box::new(PlainTextFormatter)
    };
    println!("{}", formatter.format_outcome(&outcome));
    Ok(())
}

//! alertmigrate - Legacy notification channel migration
//!
//! This library converts legacy per-alert notification channels into
//! receivers and an Alertmanager-style routing tree, preserving which
//! channels every legacy alert notified.

pub mod cli;
pub mod config;
pub mod core;
pub mod defaults;
pub mod error;
pub mod filter;
pub mod formatting;
pub mod migration;
pub mod receivers;
pub mod routes;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export core types for convenience
pub use crate::core::*;
pub use error::{MigrationError, MigrationResult};
pub use migration::{migrate_org, MigrationOutcome, Migrator, OrgConfig};

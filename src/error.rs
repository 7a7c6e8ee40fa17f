//! Error types for the migration.

use crate::core::ChannelKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("failed to convert channel '{channel}' into an integration: {reason}")]
    IntegrationConversion { channel: String, reason: String },

    #[error("alert {alert_id} references unknown notification channel {key}")]
    UnknownReceiverReference { alert_id: i64, key: ChannelKey },

    #[error("more than one receiver would be named '{name}'")]
    DuplicateReceiverName { name: String },

    #[error("more than one notification channel is identified by {key}")]
    DuplicateChannelKey { key: ChannelKey },

    #[error("migrated configuration is invalid: {0}")]
    InvalidConfiguration(String),

    #[error("{0} alerts could not be migrated")]
    SkippedAlerts(usize),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl MigrationError {
    pub fn conversion(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IntegrationConversion {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error aborts the whole run rather than a single alert.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MigrationError::UnknownReceiverReference { .. })
    }
}

pub type MigrationResult<T> = Result<T, MigrationError>;

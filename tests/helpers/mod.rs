//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use tempfile::{Builder, TempDir};

/// A legacy export with two organizations.
///
/// Org 1 has two default channels and one alert per reference form plus one
/// alert pointing at a deleted channel. Org 2 has a single default channel.
pub const LEGACY_EXPORT: &str = r##"
orgs:
  - org_id: 1
    channels:
      - uid: oncall
        id: 1
        name: On-call
        type: pagerduty
        is_default: true
        secure_settings:
          integrationKey: secret
      - uid: team-mail
        id: 2
        name: Team mail
        type: email
        is_default: true
        settings:
          addresses: team@example.com
      - uid: db-slack
        id: 3
        name: DB Slack
        type: slack
        settings:
          recipient: "#db"
      - id: 4
        name: Legacy webhook
        type: webhook
        settings:
          url: http://hooks.example.com
    alerts:
      - id: 100
        name: Disk full
        channels: [db-slack]
      - id: 101
        name: Replication lag
        channels: [4, db-slack, 3]
      - id: 102
        name: CPU high
        channels: [oncall]
      - id: 103
        name: Orphaned
        channels: [removed-channel]
  - org_id: 2
    channels:
      - uid: ops
        id: 10
        name: Ops
        type: email
        is_default: true
    alerts:
      - id: 200
        name: Heartbeat
        channels: [10]
"##;

/// Writes `content` to a temporary file with the given suffix.
pub fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

/// A temporary directory and an output path inside it.
pub fn output_path(file_name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(file_name);
    (dir, path)
}

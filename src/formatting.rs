//! Operator-facing reports of a migration run.

use crate::migration::{MigrationOutcome, SkippedAlert};
use itertools::Itertools;

/// A trait for rendering the outcome of a migration run for the operator.
pub trait ReportFormatter: Send + Sync {
    fn format_outcome(&self, outcome: &MigrationOutcome) -> String;
}

/// A plain-text report: one pass/fail line and the skipped alerts, if any.
pub struct PlainTextFormatter;

impl PlainTextFormatter {
    fn format_skipped(&self, skipped: &SkippedAlert) -> String {
        format!(
            "  - org {} alert {}: {}",
            skipped.org_id, skipped.alert_id, skipped.reason
        )
    }
}

impl ReportFormatter for PlainTextFormatter {
    fn format_outcome(&self, outcome: &MigrationOutcome) -> String {
        let receivers: usize = outcome.configs.iter().map(|c| c.receivers.len()).sum();
        let routes: usize = outcome.configs.iter().map(|c| c.route.routes.len()).sum();
        let alerts: usize = outcome.configs.iter().map(|c| c.alerts.len()).sum();
        let status = if outcome.committed { "PASS" } else { "PASS (dry run)" };

        let mut report = format!(
            "{}: migrated {} organizations, {} receivers, {} routes, {} alerts",
            status,
            outcome.configs.len(),
            receivers,
            routes,
            alerts
        );

        if !outcome.skipped.is_empty() {
            let lines = outcome
                .skipped
                .iter()
                .map(|skipped| self.format_skipped(skipped))
                .join("\n");
            report.push_str(&format!(
                "\n{} alerts were skipped:\n{}",
                outcome.skipped.len(),
                lines
            ));
        }

        report
    }
}

/// A JSON report of the whole outcome, including the configurations.
pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format_outcome(&self, outcome: &MigrationOutcome) -> String {
        serde_json::to_string_pretty(outcome).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("failed to render report: {}", e) }).to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChannelKey;
    use crate::migration::migrate_org;
    use crate::test_utils::{alert, channel};

    fn outcome(committed: bool) -> MigrationOutcome {
        let (config, skipped) = migrate_org(
            1,
            &[channel("a", 1, "pager")],
            &[
                alert(1, vec![ChannelKey::from("a")]),
                alert(2, vec![ChannelKey::from(99)]),
            ],
        )
        .unwrap();
        MigrationOutcome {
            started_at: "2025-07-05T10:30:00Z".to_string(),
            configs: vec![config],
            skipped,
            committed,
        }
    }

    #[test]
    fn test_plain_text_lists_skipped_alerts() {
        let report = PlainTextFormatter.format_outcome(&outcome(true));
        let mut lines = report.lines();
        assert_eq!(
            lines.next(),
            Some("PASS: migrated 1 organizations, 2 receivers, 1 routes, 1 alerts")
        );
        assert_eq!(lines.next(), Some("1 alerts were skipped:"));
        assert_eq!(
            lines.next(),
            Some("  - org 1 alert 2: alert 2 references unknown notification channel id:99")
        );
    }

    #[test]
    fn test_plain_text_marks_dry_runs() {
        let report = PlainTextFormatter.format_outcome(&outcome(false));
        assert!(report.starts_with("PASS (dry run)"));
    }

    #[test]
    fn test_json_report_round_trips() {
        let outcome = outcome(true);
        let report = JsonFormatter.format_outcome(&outcome);
        let parsed: MigrationOutcome = serde_json::from_str(&report).unwrap();
        assert_eq!(parsed, outcome);
    }
}

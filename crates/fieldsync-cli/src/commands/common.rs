use std::path::Path;

use fieldsync_core::db::Database;
use fieldsync_core::sync::{StageOutcome, StageReport, SyncSummary};

use crate::error::CliError;

pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    tracing::debug!("Opening local store at {}", path.display());
    Ok(Database::open(path).await?)
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

pub fn require_text(value: &str, field: &str) -> Result<String, CliError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CliError::InvalidInput(format!("{field} cannot be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

fn format_stage_line(report: &StageReport) -> String {
    let counts = report.reconciled.map_or_else(
        || format!("{} sent, {} failed", report.succeeded, report.failed),
        |tally| {
            format!(
                "{} created, {} updated, {} recreated",
                tally.created, tally.updated, tally.recreated
            )
        },
    );
    match &report.outcome {
        StageOutcome::Completed => format!("{:<24} {counts}", report.stage.label()),
        StageOutcome::Aborted { reason } => {
            format!("{:<24} {counts} (aborted: {reason})", report.stage.label())
        }
        StageOutcome::Skipped => format!("{:<24} skipped", report.stage.label()),
    }
}

pub fn format_summary_lines(summary: &SyncSummary) -> Vec<String> {
    let reachability = if summary.reachable {
        "reachable"
    } else {
        "unreachable"
    };
    let mut lines = vec![format!(
        "Sync {} against {} ({reachability})",
        summary.run_id, summary.endpoint
    )];
    for report in &summary.stages {
        lines.push(format_stage_line(report));
        lines.extend(
            report
                .warnings
                .iter()
                .map(|warning| format!("  warning: {warning}")),
        );
    }
    lines
}

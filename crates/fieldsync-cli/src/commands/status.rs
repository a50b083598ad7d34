use std::path::Path;

use chrono::Utc;
use fieldsync_core::db::{LibSqlOutboxRepository, OutboxRepository};
use fieldsync_core::models::{RecordKind, SyncableRecord};
use serde::Serialize;

use crate::commands::common::{format_relative_time, open_database};
use crate::error::CliError;

const FAILING_LIMIT: usize = 5;

#[derive(Debug, Serialize)]
pub struct KindStatus {
    pub kind: RecordKind,
    pub pending: u64,
    pub synced: u64,
    pub failing: Vec<FailingRecord>,
}

#[derive(Debug, Serialize)]
pub struct FailingRecord {
    pub id: String,
    pub created_at: i64,
    pub attempt_count: u32,
    pub last_error: String,
}

impl From<&SyncableRecord> for FailingRecord {
    fn from(record: &SyncableRecord) -> Self {
        let meta = record.meta();
        Self {
            id: record.id().to_string(),
            created_at: record.created_at(),
            attempt_count: meta.attempt_count,
            last_error: meta.last_error.clone().unwrap_or_default(),
        }
    }
}

pub async fn collect_status(outbox: &LibSqlOutboxRepository<'_>) -> Result<Vec<KindStatus>, CliError> {
    let mut statuses = Vec::with_capacity(RecordKind::PUSH_ORDER.len());
    for kind in RecordKind::PUSH_ORDER {
        let counts = outbox.status_counts(kind).await?;
        let failing = outbox.failing(kind, FAILING_LIMIT).await?;
        statuses.push(KindStatus {
            kind,
            pending: counts.pending,
            synced: counts.synced,
            failing: failing.iter().map(FailingRecord::from).collect(),
        });
    }
    Ok(statuses)
}

pub fn format_status_lines(statuses: &[KindStatus], now_ms: i64) -> Vec<String> {
    let mut lines = Vec::new();
    for status in statuses {
        lines.push(format!(
            "{:<20} {} pending, {} synced",
            status.kind.label(),
            status.pending,
            status.synced
        ));
        for record in &status.failing {
            lines.push(format!(
                "  {}  {}  attempts={}  {}",
                record.id.chars().take(13).collect::<String>(),
                format_relative_time(record.created_at, now_ms),
                record.attempt_count,
                record.last_error
            ));
        }
    }
    lines
}

pub async fn run_status(db_path: &Path, as_json: bool) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let statuses = collect_status(&LibSqlOutboxRepository::new(db.connection())).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        for line in format_status_lines(&statuses, Utc::now().timestamp_millis()) {
            println!("{line}");
        }
    }
    Ok(())
}

//! Repository for records buffered on the device until the center acknowledges them

use crate::error::{Error, Result};
use crate::models::{
    CheckinEvent, FieldReport, RecordId, RecordKind, SyncMeta, SyncStatus, SyncableRecord,
    UserRegistration,
};
use libsql::{params, Connection, Row, Value};

/// Pending/synced tallies for one record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub pending: u64,
    pub synced: u64,
}

/// Trait for outbound record storage operations (async)
#[allow(async_fn_in_trait)]
pub trait OutboxRepository {
    /// Store a new check-in event
    async fn insert_checkin(&self, event: &CheckinEvent) -> Result<()>;

    /// Store a new field report
    async fn insert_field_report(&self, report: &FieldReport) -> Result<()>;

    /// Store a new user registration
    async fn insert_registration(&self, registration: &UserRegistration) -> Result<()>;

    /// Get a record of the given kind by ID
    async fn get(&self, kind: RecordKind, id: &RecordId) -> Result<Option<SyncableRecord>>;

    /// List pending records of a kind, oldest first
    async fn pending(&self, kind: RecordKind) -> Result<Vec<SyncableRecord>>;

    /// Mark a pending record as delivered and clear its error.
    ///
    /// Returns `false` when the record was not pending.
    async fn mark_synced(&self, kind: RecordKind, id: &RecordId) -> Result<bool>;

    /// Record a failed delivery attempt on a pending record
    async fn record_failure(&self, kind: RecordKind, id: &RecordId, error: &str) -> Result<()>;

    /// Count records of a kind by sync status
    async fn status_counts(&self, kind: RecordKind) -> Result<StatusCounts>;

    /// Pending records of a kind that carry an error, most recent attempt first
    async fn failing(&self, kind: RecordKind, limit: usize) -> Result<Vec<SyncableRecord>>;
}

/// libSQL implementation of `OutboxRepository`
pub struct LibSqlOutboxRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlOutboxRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    const fn columns(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Checkin => {
                "id, subject_id, site_id, event_kind, created_at, sync_status, attempt_count, last_error"
            }
            RecordKind::FieldReport => {
                "id, site_id, occupancy_count, medical_needs_count, supply_level, created_at, sync_status, attempt_count, last_error"
            }
            RecordKind::Registration => {
                "id, display_name, username, credential_hash, created_at, sync_status, attempt_count, last_error"
            }
        }
    }

    async fn select(
        &self,
        kind: RecordKind,
        filter: &str,
        values: Vec<Value>,
    ) -> Result<Vec<SyncableRecord>> {
        let sql = format!(
            "SELECT {} FROM {} {filter}",
            Self::columns(kind),
            kind.table()
        );
        let mut rows = self.conn.query(&sql, values).await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_record(kind, &row)?);
        }
        Ok(records)
    }

    /// Parse a record from a database row selected with `columns(kind)`
    fn parse_record(kind: RecordKind, row: &Row) -> Result<SyncableRecord> {
        let id = parse_id(&row.get::<String>(0)?)?;
        let record = match kind {
            RecordKind::Checkin => SyncableRecord::Checkin(CheckinEvent {
                id,
                subject_id: row.get(1)?,
                site_id: row.get(2)?,
                event_kind: parse_text(&row.get::<String>(3)?)?,
                created_at: row.get(4)?,
                sync: parse_meta(row, 5)?,
            }),
            RecordKind::FieldReport => SyncableRecord::FieldReport(FieldReport {
                id,
                site_id: row.get(1)?,
                occupancy_count: parse_count(row.get::<i64>(2)?)?,
                medical_needs_count: parse_count(row.get::<i64>(3)?)?,
                supply_level: parse_text(&row.get::<String>(4)?)?,
                created_at: row.get(5)?,
                sync: parse_meta(row, 6)?,
            }),
            RecordKind::Registration => SyncableRecord::Registration(UserRegistration {
                id,
                display_name: row.get(1)?,
                username: row.get(2)?,
                credential_hash: row.get(3)?,
                created_at: row.get(4)?,
                sync: parse_meta(row, 5)?,
            }),
        };
        Ok(record)
    }
}

impl OutboxRepository for LibSqlOutboxRepository<'_> {
    async fn insert_checkin(&self, event: &CheckinEvent) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO checkin_events
                 (id, subject_id, site_id, event_kind, created_at, sync_status, attempt_count, last_error)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    event.id.as_str(),
                    event.subject_id.as_str(),
                    event.site_id.as_str(),
                    event.event_kind.as_str(),
                    event.created_at,
                    event.sync.sync_status.as_str(),
                    i64::from(event.sync.attempt_count),
                    optional_text(event.sync.last_error.as_deref())
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_field_report(&self, report: &FieldReport) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO field_reports
                 (id, site_id, occupancy_count, medical_needs_count, supply_level, created_at, sync_status, attempt_count, last_error)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    report.id.as_str(),
                    report.site_id.as_str(),
                    i64::from(report.occupancy_count),
                    i64::from(report.medical_needs_count),
                    report.supply_level.as_str(),
                    report.created_at,
                    report.sync.sync_status.as_str(),
                    i64::from(report.sync.attempt_count),
                    optional_text(report.sync.last_error.as_deref())
                ],
            )
            .await?;
        Ok(())
    }

    async fn insert_registration(&self, registration: &UserRegistration) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO user_registrations
                 (id, display_name, username, credential_hash, created_at, sync_status, attempt_count, last_error)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    registration.id.as_str(),
                    registration.display_name.as_str(),
                    registration.username.as_str(),
                    registration.credential_hash.as_str(),
                    registration.created_at,
                    registration.sync.sync_status.as_str(),
                    i64::from(registration.sync.attempt_count),
                    optional_text(registration.sync.last_error.as_deref())
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, kind: RecordKind, id: &RecordId) -> Result<Option<SyncableRecord>> {
        let mut records = self
            .select(kind, "WHERE id = ?", vec![Value::from(id.as_str())])
            .await?;
        Ok(records.pop())
    }

    async fn pending(&self, kind: RecordKind) -> Result<Vec<SyncableRecord>> {
        self.select(
            kind,
            "WHERE sync_status = 'pending' ORDER BY created_at ASC, id ASC",
            Vec::new(),
        )
        .await
    }

    async fn mark_synced(&self, kind: RecordKind, id: &RecordId) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET sync_status = 'synced', last_error = NULL
             WHERE id = ? AND sync_status = 'pending'",
            kind.table()
        );
        let rows = self.conn.execute(&sql, params![id.as_str()]).await?;
        Ok(rows > 0)
    }

    async fn record_failure(&self, kind: RecordKind, id: &RecordId, error: &str) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET attempt_count = attempt_count + 1, last_error = ?
             WHERE id = ? AND sync_status = 'pending'",
            kind.table()
        );
        let rows = self.conn.execute(&sql, params![error, id.as_str()]).await?;
        if rows == 0 {
            return Err(Error::NotFound(format!("pending {kind} record {id}")));
        }
        Ok(())
    }

    async fn status_counts(&self, kind: RecordKind) -> Result<StatusCounts> {
        let sql = format!(
            "SELECT
                COALESCE(SUM(CASE WHEN sync_status = 'pending' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN sync_status = 'synced' THEN 1 ELSE 0 END), 0)
             FROM {}",
            kind.table()
        );
        let mut rows = self.conn.query(&sql, ()).await?;
        let Some(row) = rows.next().await? else {
            return Ok(StatusCounts::default());
        };

        Ok(StatusCounts {
            pending: u64::try_from(row.get::<i64>(0)?).unwrap_or_default(),
            synced: u64::try_from(row.get::<i64>(1)?).unwrap_or_default(),
        })
    }

    async fn failing(&self, kind: RecordKind, limit: usize) -> Result<Vec<SyncableRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.select(
            kind,
            "WHERE sync_status = 'pending' AND last_error IS NOT NULL
             ORDER BY created_at DESC LIMIT ?",
            vec![Value::from(limit)],
        )
        .await
    }
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn parse_id(raw: &str) -> Result<RecordId> {
    raw.parse()
        .map_err(|_| Error::Database(format!("Invalid record ID in store: {raw}")))
}

fn parse_text<T>(raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(Error::Database)
}

fn parse_count(raw: i64) -> Result<u32> {
    u32::try_from(raw).map_err(|_| Error::Database(format!("Counter out of range: {raw}")))
}

fn parse_meta(row: &Row, first_column: i32) -> Result<SyncMeta> {
    let sync_status: SyncStatus = parse_text(&row.get::<String>(first_column)?)?;
    let attempt_count = parse_count(row.get::<i64>(first_column + 1)?)?;
    let last_error = match row.get_value(first_column + 2)? {
        Value::Text(text) => Some(text),
        _ => None,
    };

    Ok(SyncMeta {
        sync_status,
        attempt_count,
        last_error,
    })
}

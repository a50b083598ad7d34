//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &V1_STATEMENTS).await?;
    }
    if version < 2 {
        apply(conn, 2, &V2_STATEMENTS).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: outbound record buffers and mirrored master data
const V1_STATEMENTS: [&str; 11] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS checkin_events (
        id TEXT PRIMARY KEY,
        subject_id TEXT NOT NULL,
        site_id TEXT NOT NULL,
        event_kind TEXT NOT NULL CHECK (event_kind IN ('checkin', 'checkout')),
        created_at INTEGER NOT NULL,
        sync_status TEXT NOT NULL DEFAULT 'pending' CHECK (sync_status IN ('pending', 'synced')),
        attempt_count INTEGER NOT NULL DEFAULT 0,
        last_error TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_checkin_events_pending
        ON checkin_events(sync_status, created_at)",
    "CREATE TABLE IF NOT EXISTS field_reports (
        id TEXT PRIMARY KEY,
        site_id TEXT NOT NULL,
        occupancy_count INTEGER NOT NULL CHECK (occupancy_count >= 0),
        medical_needs_count INTEGER NOT NULL CHECK (medical_needs_count >= 0),
        supply_level TEXT NOT NULL CHECK (supply_level IN ('safe', 'warning', 'critical')),
        created_at INTEGER NOT NULL,
        sync_status TEXT NOT NULL DEFAULT 'pending' CHECK (sync_status IN ('pending', 'synced')),
        attempt_count INTEGER NOT NULL DEFAULT 0,
        last_error TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_field_reports_pending
        ON field_reports(sync_status, created_at)",
    "CREATE TABLE IF NOT EXISTS user_registrations (
        id TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        credential_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        sync_status TEXT NOT NULL DEFAULT 'pending' CHECK (sync_status IN ('pending', 'synced')),
        attempt_count INTEGER NOT NULL DEFAULT 0,
        last_error TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_user_registrations_pending
        ON user_registrations(sync_status, created_at)",
    "CREATE TABLE IF NOT EXISTS distribution_items (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS user_accounts (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL DEFAULT '',
        email TEXT NOT NULL DEFAULT '',
        credential_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'general',
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE INDEX IF NOT EXISTS idx_user_accounts_role ON user_accounts(role)",
    "INSERT INTO schema_version (version) VALUES (1)",
];

/// Version 2: store-level guard keeping `sync_status` monotonic
const V2_STATEMENTS: [&str; 4] = [
    "CREATE TRIGGER IF NOT EXISTS checkin_events_status_guard BEFORE UPDATE OF sync_status ON checkin_events
     FOR EACH ROW
     WHEN OLD.sync_status = 'synced' AND NEW.sync_status <> 'synced'
     BEGIN
         SELECT RAISE(ABORT, 'sync_status cannot revert from synced');
     END",
    "CREATE TRIGGER IF NOT EXISTS field_reports_status_guard BEFORE UPDATE OF sync_status ON field_reports
     FOR EACH ROW
     WHEN OLD.sync_status = 'synced' AND NEW.sync_status <> 'synced'
     BEGIN
         SELECT RAISE(ABORT, 'sync_status cannot revert from synced');
     END",
    "CREATE TRIGGER IF NOT EXISTS user_registrations_status_guard BEFORE UPDATE OF sync_status ON user_registrations
     FOR EACH ROW
     WHEN OLD.sync_status = 'synced' AND NEW.sync_status <> 'synced'
     BEGIN
         SELECT RAISE(ABORT, 'sync_status cannot revert from synced');
     END",
    "INSERT INTO schema_version (version) VALUES (2)",
];

/// Apply one migration's statements atomically
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version} (latest {CURRENT_VERSION})");
    Ok(())
}

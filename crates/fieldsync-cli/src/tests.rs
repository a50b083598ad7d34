use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use fieldsync_core::db::{Database, LibSqlOutboxRepository, OutboxRepository};
use fieldsync_core::models::{RecordKind, SupplyLevel, SyncableRecord};
use fieldsync_core::sync::{ReconcileTally, StageReport, SyncStage, SyncSummary};
use fieldsync_core::SyncSettings;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use crate::cli::{ConfigCommands, RecordCommands};
use crate::commands::common::{format_relative_time, format_summary_lines, require_text};
use crate::commands::config::run_config;
use crate::commands::master::{format_user_line, UserListItem};
use crate::commands::record::record_entry;
use crate::commands::status::{collect_status, format_status_lines};
use crate::config_file::{load_settings_with, redacted_settings_json, EnvOverrides};
use crate::error::CliError;

fn overrides(pairs: &[(&str, &str)]) -> EnvOverrides {
    let env = pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect::<HashMap<_, _>>();
    EnvOverrides::from_lookup(|key| env.get(key).cloned())
}

fn saved_settings(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("config.json");
    let mut settings = SyncSettings::new(
        vec!["https://central-a.example.org".to_string()],
        "SHELTER_001",
        "RPi_Shelter_A_01",
    );
    settings.api_token = Some("file-token".to_string());
    settings.save_to_path(&path).unwrap();
    path
}

#[test]
fn env_overrides_split_and_trim_urls() {
    let overrides = overrides(&[
        (
            "FIELDSYNC_CENTRAL_URLS",
            " https://a.example.org , ,https://b.example.org ",
        ),
        ("FIELDSYNC_SITE_ID", "  "),
    ]);

    assert_eq!(
        overrides.central_urls,
        Some(vec![
            "https://a.example.org".to_string(),
            "https://b.example.org".to_string()
        ])
    );
    assert_eq!(overrides.site_id, None);
}

#[test]
fn env_overrides_alone_need_urls_site_and_device() {
    let partial = overrides(&[
        ("FIELDSYNC_CENTRAL_URLS", "https://a.example.org"),
        ("FIELDSYNC_SITE_ID", "SHELTER_001"),
    ]);
    assert!(partial.apply(None).is_none());

    let complete = overrides(&[
        ("FIELDSYNC_CENTRAL_URLS", "https://a.example.org"),
        ("FIELDSYNC_SITE_ID", "SHELTER_001"),
        ("FIELDSYNC_DEVICE_ID", "RPi_01"),
    ]);
    let settings = complete.apply(None).unwrap();
    assert_eq!(settings.site_id, "SHELTER_001");
    assert_eq!(settings.device_id, "RPi_01");
}

#[test]
fn load_settings_layers_env_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = saved_settings(&dir);

    let settings = load_settings_with(
        &path,
        overrides(&[
            ("FIELDSYNC_API_TOKEN", "env-token"),
            ("FIELDSYNC_DEVICE_ID", "RPi_Shelter_A_02"),
        ]),
    )
    .unwrap();

    assert_eq!(settings.site_id, "SHELTER_001");
    assert_eq!(settings.device_id, "RPi_Shelter_A_02");
    assert_eq!(settings.api_token.as_deref(), Some("env-token"));
}

#[test]
fn load_settings_without_file_or_env_is_not_configured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");

    let error = load_settings_with(&path, EnvOverrides::default()).unwrap_err();
    assert!(matches!(error, CliError::NotConfigured(found) if found == path));
}

#[test]
fn load_settings_rejects_invalid_urls() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");

    let error = load_settings_with(
        &path,
        overrides(&[
            ("FIELDSYNC_CENTRAL_URLS", "central.example.org"),
            ("FIELDSYNC_SITE_ID", "SHELTER_001"),
            ("FIELDSYNC_DEVICE_ID", "RPi_01"),
        ]),
    )
    .unwrap_err();
    assert!(error.to_string().contains("http://"));
}

#[test]
fn redacted_settings_hide_token() {
    let mut settings = SyncSettings::new(
        vec!["https://central-a.example.org".to_string()],
        "SHELTER_001",
        "RPi_01",
    );
    settings.api_token = Some("secret".to_string());

    let value = redacted_settings_json(&settings).unwrap();
    assert_eq!(value["api_token"], "[REDACTED]");
    assert!(!value.to_string().contains("secret"));
}

#[test]
fn config_init_refuses_to_overwrite_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let path = saved_settings(&dir);
    let init = |force| ConfigCommands::Init {
        central_urls: vec!["https://central-b.example.org/".to_string()],
        site_id: "SHELTER_002".to_string(),
        device_id: "RPi_02".to_string(),
        api_token: None,
        api_base_path: Some("v2".to_string()),
        insecure: true,
        skip_when_offline: false,
        force,
    };

    assert!(matches!(
        run_config(init(false), &path),
        Err(CliError::ConfigExists(_))
    ));

    run_config(init(true), &path).unwrap();
    let written = SyncSettings::load_from_path(&path).unwrap();
    assert_eq!(
        written.central_server_urls,
        vec!["https://central-b.example.org".to_string()]
    );
    assert_eq!(written.api_base_path, "/v2/");
    assert!(!written.verify_tls);
}

#[test]
fn require_text_trims_and_rejects_blank() {
    assert_eq!(require_text("  hanako ", "username").unwrap(), "hanako");
    assert!(matches!(
        require_text(" \t", "username"),
        Err(CliError::InvalidInput(message)) if message == "username cannot be empty"
    ));
}

#[test]
fn format_relative_time_buckets() {
    let now = 10 * 24 * 60 * 60 * 1000;
    assert_eq!(format_relative_time(now - 5_000, now), "just now");
    assert_eq!(format_relative_time(now - 3 * 60_000, now), "3m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(0, now), "10d ago");
}

#[test]
fn summary_lines_show_counts_and_aborts() {
    let started_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let mut checkins = StageReport::new(SyncStage::PushCheckins);
    checkins.succeeded = 2;
    checkins.failed = 1;
    checkins.abort("Network error: connection reset");
    let mut registrations = StageReport::new(SyncStage::PushRegistrations);
    registrations.succeeded = 1;
    registrations
        .warnings
        .push("Could not create local account for hanako: IO error: disk full".to_string());
    let mut items = StageReport::new(SyncStage::PullDistributionItems);
    items.reconciled = Some(ReconcileTally {
        created: 1,
        updated: 3,
        recreated: 0,
    });
    let summary = SyncSummary {
        run_id: Uuid::nil(),
        started_at,
        finished_at: started_at,
        endpoint: "https://central-a.example.org".to_string(),
        reachable: true,
        stages: vec![
            registrations,
            checkins,
            items,
            StageReport::skipped(SyncStage::PullUsers),
        ],
    };

    let lines = format_summary_lines(&summary);
    assert_eq!(lines.len(), 6);
    assert!(lines[0].ends_with("https://central-a.example.org (reachable)"));
    assert!(lines[1].contains("1 sent, 0 failed"));
    assert_eq!(
        lines[2],
        "  warning: Could not create local account for hanako: IO error: disk full"
    );
    assert!(lines[3].contains("2 sent, 1 failed (aborted: Network error: connection reset)"));
    assert!(lines[4].contains("1 created, 3 updated, 0 recreated"));
    assert!(lines[5].ends_with("skipped"));
}

#[test]
fn user_line_flags_admin_and_inactive() {
    let item = UserListItem {
        id: "7".to_string(),
        username: "admin".to_string(),
        display_name: "Site Admin".to_string(),
        role: fieldsync_core::models::Role::Admin,
        is_active: false,
        admin: true,
    };
    assert!(format_user_line(&item).ends_with("admin [admin, inactive]"));
}

#[tokio::test(flavor = "multi_thread")]
async fn record_uses_override_site_and_shows_in_status() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = saved_settings(&dir);
    let db = Database::open(dir.path().join("fieldsync.db")).await.unwrap();
    let outbox = LibSqlOutboxRepository::new(db.connection());

    let checkin_id = record_entry(
        RecordCommands::Checkin {
            subject: " taro ".to_string(),
            checkout: false,
            site: None,
        },
        &config_path,
        &outbox,
    )
    .await
    .unwrap();
    let report_id = record_entry(
        RecordCommands::Report {
            occupancy: 40,
            medical: 2,
            supply: SupplyLevel::Critical,
            site: Some("SHELTER_009".to_string()),
        },
        &config_path,
        &outbox,
    )
    .await
    .unwrap();

    let Some(SyncableRecord::Checkin(checkin)) =
        outbox.get(RecordKind::Checkin, &checkin_id).await.unwrap()
    else {
        panic!("check-in not stored");
    };
    assert_eq!(checkin.subject_id, "taro");
    assert_eq!(checkin.site_id, "SHELTER_001");

    let Some(SyncableRecord::FieldReport(report)) =
        outbox.get(RecordKind::FieldReport, &report_id).await.unwrap()
    else {
        panic!("field report not stored");
    };
    assert_eq!(report.site_id, "SHELTER_009");

    outbox
        .record_failure(RecordKind::FieldReport, &report_id, "HTTP 400: Invalid site_id")
        .await
        .unwrap();

    let statuses = collect_status(&outbox).await.unwrap();
    assert_eq!(
        statuses.iter().map(|status| status.kind).collect::<Vec<_>>(),
        RecordKind::PUSH_ORDER.to_vec()
    );
    let reports = &statuses[2];
    assert_eq!((reports.pending, reports.synced), (1, 0));
    assert_eq!(reports.failing.len(), 1);
    assert_eq!(reports.failing[0].attempt_count, 1);

    let lines = format_status_lines(&statuses, report.created_at);
    assert!(lines
        .iter()
        .any(|line| line.ends_with("attempts=1  HTTP 400: Invalid site_id")));
}

#[tokio::test(flavor = "multi_thread")]
async fn register_rejects_blank_username() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().await.unwrap();
    let outbox = LibSqlOutboxRepository::new(db.connection());

    let error = record_entry(
        RecordCommands::Register {
            username: "   ".to_string(),
            display_name: "Nobody".to_string(),
            credential_hash: "pbkdf2_sha256$x".to_string(),
        },
        &dir.path().join("unused.json"),
        &outbox,
    )
    .await
    .unwrap_err();

    assert!(matches!(error, CliError::InvalidInput(_)));
    assert_eq!(
        outbox
            .status_counts(RecordKind::Registration)
            .await
            .unwrap()
            .pending,
        0
    );
}

use std::path::Path;

use fieldsync_core::db::{LibSqlOutboxRepository, OutboxRepository};
use fieldsync_core::models::{CheckinEvent, CheckinKind, FieldReport, RecordId, UserRegistration};

use crate::cli::RecordCommands;
use crate::commands::common::{open_database, require_text};
use crate::config_file::load_settings;
use crate::error::CliError;

/// Site recorded on a new event: an explicit override, else the configured site.
fn resolve_site(site: Option<String>, config_path: &Path) -> Result<String, CliError> {
    match site {
        Some(site) => require_text(&site, "site"),
        None => Ok(load_settings(config_path)?.site_id),
    }
}

pub async fn record_entry(
    command: RecordCommands,
    config_path: &Path,
    outbox: &LibSqlOutboxRepository<'_>,
) -> Result<RecordId, CliError> {
    match command {
        RecordCommands::Checkin {
            subject,
            checkout,
            site,
        } => {
            let subject = require_text(&subject, "subject")?;
            let site = resolve_site(site, config_path)?;
            let kind = if checkout {
                CheckinKind::Checkout
            } else {
                CheckinKind::Checkin
            };
            let event = CheckinEvent::new(subject, site, kind);
            outbox.insert_checkin(&event).await?;
            Ok(event.id)
        }
        RecordCommands::Report {
            occupancy,
            medical,
            supply,
            site,
        } => {
            let site = resolve_site(site, config_path)?;
            let report = FieldReport::new(site, occupancy, medical, supply);
            outbox.insert_field_report(&report).await?;
            Ok(report.id)
        }
        RecordCommands::Register {
            username,
            display_name,
            credential_hash,
        } => {
            let registration = UserRegistration::new(
                require_text(&display_name, "display name")?,
                require_text(&username, "username")?,
                require_text(&credential_hash, "credential hash")?,
            );
            outbox.insert_registration(&registration).await?;
            Ok(registration.id)
        }
    }
}

pub async fn run_record(
    command: RecordCommands,
    config_path: &Path,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let outbox = LibSqlOutboxRepository::new(db.connection());
    let id = record_entry(command, config_path, &outbox).await?;

    println!("{id}");
    Ok(())
}

//! Push of locally buffered records to the central server.

use super::run::StageReport;
use super::transport::CentralTransport;
use crate::config::SyncSettings;
use crate::db::{
    Database, LibSqlMasterDataRepository, LibSqlOutboxRepository, MasterDataRepository,
    OutboxRepository,
};
use crate::error::Result;
use crate::models::{MasterId, RecordKind, Role, SyncableRecord, UserAccount, UserRegistration};

/// Drains pending records of one kind, oldest first, one request each
pub struct OutboundSyncer<'a, T> {
    transport: &'a T,
    settings: &'a SyncSettings,
    base_url: &'a str,
    outbox: LibSqlOutboxRepository<'a>,
    accounts: LibSqlMasterDataRepository<'a>,
}

enum Delivery {
    /// Synced by this run; carries a warning if a local side effect failed
    Accepted(Option<String>),
    /// Acknowledged, but the record was no longer pending locally
    AlreadySynced,
    Rejected,
    /// The rest of this kind's batch must wait for the next run
    Halted(String),
}

impl<'a, T: CentralTransport> OutboundSyncer<'a, T> {
    pub const fn new(
        db: &'a Database,
        transport: &'a T,
        settings: &'a SyncSettings,
        base_url: &'a str,
    ) -> Self {
        Self {
            transport,
            settings,
            base_url,
            outbox: LibSqlOutboxRepository::new(db.connection()),
            accounts: LibSqlMasterDataRepository::new(db.connection()),
        }
    }

    fn endpoint_path(&self, kind: RecordKind) -> &str {
        let endpoints = &self.settings.endpoints;
        match kind {
            RecordKind::Checkin => &endpoints.checkin,
            RecordKind::FieldReport => &endpoints.field_report,
            RecordKind::Registration => &endpoints.registration,
        }
    }

    /// Push every pending record of `kind`.
    ///
    /// A rejected record is recorded and skipped; a network failure stops the
    /// batch after recording it on the current record.
    pub async fn push(&self, kind: RecordKind) -> StageReport {
        let mut report = StageReport::new(kind);
        let pending = match self.outbox.pending(kind).await {
            Ok(pending) => pending,
            Err(error) => {
                tracing::warn!("Failed to load pending {}: {}", kind, error);
                report.abort(error.to_string());
                return report;
            }
        };
        if pending.is_empty() {
            tracing::debug!("No pending {}", kind);
            return report;
        }

        let url = self
            .settings
            .endpoint_url(self.base_url, self.endpoint_path(kind));
        tracing::info!("Pushing {} pending {} to {}", pending.len(), kind, url);

        for record in pending {
            match self.deliver(&url, &record).await {
                Ok(Delivery::Accepted(warning)) => {
                    report.succeeded += 1;
                    report.warnings.extend(warning);
                }
                Ok(Delivery::AlreadySynced) => {}
                Ok(Delivery::Rejected) => report.failed += 1,
                Ok(Delivery::Halted(reason)) => {
                    report.failed += 1;
                    report.abort(reason);
                    break;
                }
                Err(error) => {
                    tracing::warn!("Store error while pushing {}: {}", kind, error);
                    report.abort(error.to_string());
                    break;
                }
            }
        }

        report
    }

    async fn deliver(&self, url: &str, record: &SyncableRecord) -> Result<Delivery> {
        let kind = record.kind();
        let payload = record.payload(&self.settings.device_id);

        match self
            .transport
            .post_json(url, &payload, self.settings.push_timeout())
            .await
        {
            Ok(reply) if reply.is_accepted() => {
                if !self.outbox.mark_synced(kind, record.id()).await? {
                    tracing::warn!(
                        "{} {} was already synced by another run; not counting it",
                        kind,
                        record.id()
                    );
                    return Ok(Delivery::AlreadySynced);
                }
                tracing::debug!("Central server accepted {} {}", kind, record.id());

                let mut warning = None;
                if let SyncableRecord::Registration(registration) = record {
                    if let Err(error) = self.ensure_local_account(registration).await {
                        let message = format!(
                            "Could not create local account for {}: {}",
                            registration.username, error
                        );
                        tracing::warn!("{}", message);
                        warning = Some(message);
                    }
                }
                Ok(Delivery::Accepted(warning))
            }
            Ok(reply) => {
                let message = format!("HTTP {}: {}", reply.status, reply.error_message());
                tracing::warn!("Central server rejected {} {}: {}", kind, record.id(), message);
                self.outbox
                    .record_failure(kind, record.id(), &message)
                    .await?;
                Ok(Delivery::Rejected)
            }
            Err(error) => {
                let message = error.to_string();
                tracing::warn!("Pushing {} {} failed: {}", kind, record.id(), message);
                self.outbox
                    .record_failure(kind, record.id(), &message)
                    .await?;
                Ok(Delivery::Halted(message))
            }
        }
    }

    /// Let a freshly registered user sign in before the next users pull.
    async fn ensure_local_account(&self, registration: &UserRegistration) -> Result<()> {
        if self
            .accounts
            .find_user_by_username(&registration.username)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let account = UserAccount {
            id: MasterId::new(registration.id.as_str()),
            username: registration.username.clone(),
            display_name: registration.display_name.clone(),
            email: String::new(),
            credential_hash: registration.credential_hash.clone(),
            role: Role::General,
            is_active: true,
        };
        self.accounts.insert_user(&account).await?;
        tracing::info!(
            "Created provisional local account for {}",
            registration.username
        );
        Ok(())
    }
}

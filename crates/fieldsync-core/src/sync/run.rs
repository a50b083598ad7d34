//! One sync run: connectivity check, outbound push, inbound pull.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::endpoint::EndpointResolver;
use super::inbound::{InboundSyncer, MasterCollection, ReconcileOutcome};
use super::outbound::OutboundSyncer;
use super::transport::CentralTransport;
use crate::config::SyncSettings;
use crate::db::Database;
use crate::error::Result;
use crate::models::RecordKind;

/// Stages of a run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    PushRegistrations,
    PushCheckins,
    PushFieldReports,
    PullDistributionItems,
    PullUsers,
}

impl SyncStage {
    pub const ALL: [Self; 5] = [
        Self::PushRegistrations,
        Self::PushCheckins,
        Self::PushFieldReports,
        Self::PullDistributionItems,
        Self::PullUsers,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::PushRegistrations => "push user registrations",
            Self::PushCheckins => "push check-in events",
            Self::PushFieldReports => "push field reports",
            Self::PullDistributionItems => "pull distribution items",
            Self::PullUsers => "pull users",
        }
    }

    pub const fn is_pull(self) -> bool {
        matches!(self, Self::PullDistributionItems | Self::PullUsers)
    }
}

impl From<RecordKind> for SyncStage {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Registration => Self::PushRegistrations,
            RecordKind::Checkin => Self::PushCheckins,
            RecordKind::FieldReport => Self::PushFieldReports,
        }
    }
}

impl From<MasterCollection> for SyncStage {
    fn from(collection: MasterCollection) -> Self {
        match collection {
            MasterCollection::DistributionItems => Self::PullDistributionItems,
            MasterCollection::Users => Self::PullUsers,
        }
    }
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    Aborted { reason: String },
    Skipped,
}

/// Per-entity pull outcomes, counted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileTally {
    pub created: usize,
    pub updated: usize,
    pub recreated: usize,
}

impl ReconcileTally {
    pub fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Created => self.created += 1,
            ReconcileOutcome::Updated => self.updated += 1,
            ReconcileOutcome::Recreated => self.recreated += 1,
        }
    }

    pub const fn total(&self) -> usize {
        self.created + self.updated + self.recreated
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: SyncStage,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciled: Option<ReconcileTally>,
    pub outcome: StageOutcome,
    /// Problems that did not fail a record, e.g. a local side effect
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl StageReport {
    pub fn new(stage: impl Into<SyncStage>) -> Self {
        let stage = stage.into();
        Self {
            stage,
            succeeded: 0,
            failed: 0,
            reconciled: stage.is_pull().then(ReconcileTally::default),
            outcome: StageOutcome::Completed,
            warnings: Vec::new(),
        }
    }

    pub fn skipped(stage: SyncStage) -> Self {
        Self {
            outcome: StageOutcome::Skipped,
            ..Self::new(stage)
        }
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.outcome = StageOutcome::Aborted {
            reason: reason.into(),
        };
    }

    pub const fn is_completed(&self) -> bool {
        matches!(self.outcome, StageOutcome::Completed)
    }
}

/// Result of one run, returned to whoever triggered it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub endpoint: String,
    pub reachable: bool,
    pub stages: Vec<StageReport>,
}

impl SyncSummary {
    pub fn stage(&self, stage: SyncStage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }

    /// Every stage completed and no record was rejected
    pub fn is_clean(&self) -> bool {
        self.stages
            .iter()
            .all(|report| report.is_completed() && report.failed == 0)
    }

    pub fn total_pushed(&self) -> usize {
        self.stages
            .iter()
            .filter(|report| !report.stage.is_pull())
            .map(|report| report.succeeded)
            .sum()
    }
}

/// A single pass over every stage against one resolved endpoint
pub struct SyncRun<'a, T> {
    db: &'a Database,
    transport: &'a T,
    settings: &'a SyncSettings,
}

impl<'a, T: CentralTransport> SyncRun<'a, T> {
    pub const fn new(db: &'a Database, transport: &'a T, settings: &'a SyncSettings) -> Self {
        Self {
            db,
            transport,
            settings,
        }
    }

    /// Run every stage in order.
    ///
    /// Stage failures end up in the summary; only invalid settings fail the
    /// run as a whole.
    pub async fn execute(self, run_id: Uuid) -> Result<SyncSummary> {
        self.settings.validate()?;
        let started_at = Utc::now();
        let mut resolver = EndpointResolver::new(
            self.transport,
            &self.settings.central_server_urls,
            self.settings.probe_timeout(),
        )?;
        let endpoint = resolver.resolve().await;
        tracing::info!(
            "Sync run {} started against {} (reachable: {})",
            run_id,
            endpoint.base_url,
            endpoint.reachable
        );

        let stages = if self.settings.skip_when_offline && !endpoint.reachable {
            tracing::warn!("Central server offline; skipping every stage");
            SyncStage::ALL.map(StageReport::skipped).to_vec()
        } else {
            self.run_stages(&endpoint.base_url).await
        };

        let summary = SyncSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            endpoint: endpoint.base_url,
            reachable: endpoint.reachable,
            stages,
        };
        log_summary(&summary);
        Ok(summary)
    }

    async fn run_stages(&self, base_url: &str) -> Vec<StageReport> {
        let mut stages = Vec::with_capacity(SyncStage::ALL.len());

        let outbound = OutboundSyncer::new(self.db, self.transport, self.settings, base_url);
        for kind in RecordKind::PUSH_ORDER {
            stages.push(outbound.push(kind).await);
        }

        let inbound = InboundSyncer::new(self.db, self.transport, self.settings, base_url);
        for collection in MasterCollection::PULL_ORDER {
            let mut report = StageReport::new(collection);
            let mut applied = Vec::new();
            let result = inbound.pull_into(collection, &mut applied).await;

            let mut tally = ReconcileTally::default();
            for entity in &applied {
                tally.record(entity.outcome);
            }
            report.succeeded = tally.total();
            report.reconciled = Some(tally);
            if let Err(error) = result {
                tracing::warn!(
                    "Pull of {} aborted after {} entities: {}",
                    collection,
                    applied.len(),
                    error
                );
                report.abort(error.to_string());
            }
            stages.push(report);
        }

        stages
    }
}

fn log_summary(summary: &SyncSummary) {
    for report in &summary.stages {
        match &report.outcome {
            StageOutcome::Completed => tracing::info!(
                "{}: {} succeeded, {} failed",
                report.stage,
                report.succeeded,
                report.failed
            ),
            StageOutcome::Aborted { reason } => tracing::warn!(
                "{}: aborted after {} succeeded, {} failed: {}",
                report.stage,
                report.succeeded,
                report.failed,
                reason
            ),
            StageOutcome::Skipped => tracing::info!("{}: skipped", report.stage),
        }
    }
    tracing::info!(
        "Sync run {} finished ({} records pushed)",
        summary.run_id,
        summary.total_pushed()
    );
}

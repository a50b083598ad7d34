//! Trigger surface for sync runs with run-level mutual exclusion.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::lock::RunLock;
use super::run::{SyncRun, SyncSummary};
use super::transport::CentralTransport;
use crate::config::SyncSettings;
use crate::db::Database;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("A sync run is already in progress")]
    AlreadyRunning,
    #[error(transparent)]
    Core(#[from] crate::Error),
    #[error("Sync job {id} did not finish: {reason}")]
    JobFailed { id: Uuid, reason: String },
}

/// Handle to a submitted background run
#[derive(Debug)]
pub struct SyncJob {
    pub id: Uuid,
    pub accepted_at: DateTime<Utc>,
    handle: JoinHandle<crate::Result<SyncSummary>>,
}

impl SyncJob {
    /// Wait for the run to finish and return its summary
    pub async fn wait(self) -> Result<SyncSummary, SyncError> {
        let id = self.id;
        let outcome = self.handle.await.map_err(|error| SyncError::JobFailed {
            id,
            reason: error.to_string(),
        })?;
        Ok(outcome?)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Both halves of the single-flight guard, held until the run ends
struct RunPermit {
    _local: OwnedMutexGuard<()>,
    _file: Option<RunLock>,
}

/// Owns what a run needs and guarantees at most one run at a time.
///
/// Exclusion covers every runner on the same database file, in this process
/// or another. Overlapping triggers are rejected, not queued.
pub struct SyncRunner<T> {
    db: Arc<Database>,
    transport: Arc<T>,
    settings: Arc<SyncSettings>,
    guard: Arc<Mutex<()>>,
}

impl<T> Clone for SyncRunner<T> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            transport: Arc::clone(&self.transport),
            settings: Arc::clone(&self.settings),
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<T: CentralTransport + 'static> SyncRunner<T> {
    pub fn new(db: Arc<Database>, transport: T, settings: SyncSettings) -> Result<Self, SyncError> {
        settings.validate()?;
        Ok(Self {
            db,
            transport: Arc::new(transport),
            settings: Arc::new(settings),
            guard: Arc::new(Mutex::new(())),
        })
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        matches!(self.acquire(), Err(SyncError::AlreadyRunning))
    }

    fn acquire(&self) -> Result<RunPermit, SyncError> {
        let local = Arc::clone(&self.guard)
            .try_lock_owned()
            .map_err(|_| SyncError::AlreadyRunning)?;
        let file = match self.db.path() {
            Some(db_path) => {
                let lock = RunLock::try_acquire(&RunLock::path_for(db_path))?
                    .ok_or(SyncError::AlreadyRunning)?;
                tracing::debug!("Holding run lock {}", lock.path().display());
                Some(lock)
            }
            None => None,
        };
        Ok(RunPermit {
            _local: local,
            _file: file,
        })
    }

    /// Start a run in the background.
    ///
    /// The guard is taken before this returns and released when the run ends.
    pub fn submit(&self) -> Result<SyncJob, SyncError> {
        let permit = self.acquire()?;
        let id = Uuid::now_v7();
        let accepted_at = Utc::now();
        let db = Arc::clone(&self.db);
        let transport = Arc::clone(&self.transport);
        let settings = Arc::clone(&self.settings);

        tracing::info!("Accepted sync job {}", id);
        let handle = tokio::spawn(async move {
            let _permit = permit;
            SyncRun::new(&db, transport.as_ref(), &settings)
                .execute(id)
                .await
        });

        Ok(SyncJob {
            id,
            accepted_at,
            handle,
        })
    }

    /// Run inline on the caller's task
    pub async fn run_now(&self) -> Result<SyncSummary, SyncError> {
        let _permit = self.acquire()?;
        let summary = SyncRun::new(&self.db, self.transport.as_ref(), &self.settings)
            .execute(Uuid::now_v7())
            .await?;
        Ok(summary)
    }
}

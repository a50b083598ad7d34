//! Synchronization engine.
//!
//! A run resolves one reachable central server, pushes pending local records
//! (registrations, check-ins, field reports), then pulls distribution items
//! and users into the local mirror. `SyncRunner` is the entry point.

mod endpoint;
mod inbound;
mod lock;
#[cfg(test)]
mod mock;
mod outbound;
mod run;
mod runner;
mod transport;

pub use endpoint::{EndpointResolver, ResolvedEndpoint};
pub use inbound::{InboundSyncer, MasterCollection, PullError, ReconcileOutcome, Reconciled};
pub use lock::RunLock;
pub use outbound::OutboundSyncer;
pub use run::{ReconcileTally, StageOutcome, StageReport, SyncRun, SyncStage, SyncSummary};
pub use runner::{SyncError, SyncJob, SyncRunner};
pub use transport::{parse_error_message, CentralTransport, HttpReply, HttpTransport, TransportError};

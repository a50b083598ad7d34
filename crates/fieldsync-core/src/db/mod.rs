//! Local record store for fieldsync

mod connection;
mod master_repository;
mod migrations;
mod outbox_repository;

pub use connection::Database;
pub use master_repository::{LibSqlMasterDataRepository, MasterDataRepository};
pub use outbox_repository::{LibSqlOutboxRepository, OutboxRepository, StatusCounts};

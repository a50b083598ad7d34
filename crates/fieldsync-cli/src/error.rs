use std::io;
use std::path::PathBuf;

use fieldsync_core::sync::{SyncError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fieldsync_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(
        "Sync is not configured. Run `fieldsync config init` (expected {}) or set FIELDSYNC_CENTRAL_URLS, FIELDSYNC_SITE_ID and FIELDSYNC_DEVICE_ID.",
        .0.display()
    )]
    NotConfigured(PathBuf),
    #[error("Settings file already exists at {}; pass --force to overwrite", .0.display())]
    ConfigExists(PathBuf),
}

//! fieldsync-core - Core library for fieldsync
//!
//! This crate contains the record models, the device-local libSQL store, and
//! the synchronization engine that reconciles an edge device with its central
//! server. The CLI (and any field UI) builds on top of it.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use config::SyncSettings;
pub use error::{Error, Result};
pub use sync::{SyncRunner, SyncSummary};

//! Shared sync metadata for locally buffered records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{CheckinEvent, FieldReport, UserRegistration};

/// A unique identifier for a locally created record, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Delivery state of a buffered record.
///
/// Transitions only from `Pending` to `Synced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            other => Err(format!("unknown sync status '{other}'")),
        }
    }
}

/// Sync bookkeeping carried by every buffered record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncMeta {
    pub sync_status: SyncStatus,
    /// Failed push attempts; never reset
    pub attempt_count: u32,
    /// Last failure description, cleared on success
    pub last_error: Option<String>,
}

impl SyncMeta {
    pub const fn is_pending(&self) -> bool {
        matches!(self.sync_status, SyncStatus::Pending)
    }
}

/// The three kinds of records the device buffers for the central server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Registration,
    Checkin,
    FieldReport,
}

impl RecordKind {
    /// Push order used by a sync run
    pub const PUSH_ORDER: [Self; 3] = [Self::Registration, Self::Checkin, Self::FieldReport];

    /// Backing table for this record kind
    pub const fn table(self) -> &'static str {
        match self {
            Self::Registration => "user_registrations",
            Self::Checkin => "checkin_events",
            Self::FieldReport => "field_reports",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Registration => "user registrations",
            Self::Checkin => "check-in events",
            Self::FieldReport => "field reports",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A locally buffered record awaiting (or past) delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncableRecord {
    Checkin(CheckinEvent),
    FieldReport(FieldReport),
    Registration(UserRegistration),
}

impl SyncableRecord {
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Checkin(_) => RecordKind::Checkin,
            Self::FieldReport(_) => RecordKind::FieldReport,
            Self::Registration(_) => RecordKind::Registration,
        }
    }

    pub const fn id(&self) -> &RecordId {
        match self {
            Self::Checkin(record) => &record.id,
            Self::FieldReport(record) => &record.id,
            Self::Registration(record) => &record.id,
        }
    }

    pub const fn created_at(&self) -> i64 {
        match self {
            Self::Checkin(record) => record.created_at,
            Self::FieldReport(record) => record.created_at,
            Self::Registration(record) => record.created_at,
        }
    }

    pub const fn meta(&self) -> &SyncMeta {
        match self {
            Self::Checkin(record) => &record.sync,
            Self::FieldReport(record) => &record.sync,
            Self::Registration(record) => &record.sync,
        }
    }

    /// Build the JSON body sent to the central server.
    ///
    /// `device_id` is injected by the caller; it is not stored per record.
    pub fn payload(&self, device_id: &str) -> serde_json::Value {
        match self {
            Self::Checkin(record) => record.payload(device_id),
            Self::FieldReport(record) => record.payload(device_id),
            Self::Registration(record) => record.payload(),
        }
    }
}

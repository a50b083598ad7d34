//! Check-in event model

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use super::{RecordId, SyncMeta};
use crate::util::{millis_to_rfc3339, unix_millis_now};

/// Whether a subject entered or left the site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckinKind {
    #[default]
    Checkin,
    Checkout,
}

impl CheckinKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkin => "checkin",
            Self::Checkout => "checkout",
        }
    }
}

impl fmt::Display for CheckinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckinKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checkin" => Ok(Self::Checkin),
            "checkout" => Ok(Self::Checkout),
            other => Err(format!("unknown check-in kind '{other}'")),
        }
    }
}

/// A subject entering or leaving a site, as scanned at the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinEvent {
    pub id: RecordId,
    /// Login id read from the subject's QR code
    pub subject_id: String,
    /// Site this event belongs to; authoritative over the device default
    pub site_id: String,
    pub event_kind: CheckinKind,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    pub sync: SyncMeta,
}

impl CheckinEvent {
    /// Create a new pending check-in event stamped with the current time
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        site_id: impl Into<String>,
        event_kind: CheckinKind,
    ) -> Self {
        Self {
            id: RecordId::new(),
            subject_id: subject_id.into(),
            site_id: site_id.into(),
            event_kind,
            created_at: unix_millis_now(),
            sync: SyncMeta::default(),
        }
    }

    pub(crate) fn payload(&self, device_id: &str) -> serde_json::Value {
        json!({
            "subject_id": self.subject_id,
            "site_id": self.site_id,
            "event_kind": self.event_kind,
            "occurred_at": millis_to_rfc3339(self.created_at),
            "device_id": device_id,
        })
    }
}

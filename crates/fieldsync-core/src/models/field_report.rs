//! Field status report model

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use super::{RecordId, SyncMeta};
use crate::util::{millis_to_rfc3339, unix_millis_now};

/// How long the site's food supply is expected to last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyLevel {
    /// Three days or more
    Safe,
    /// One to three days
    Warning,
    /// Runs out today
    Critical,
}

impl SupplyLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for SupplyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupplyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown supply level '{other}'")),
        }
    }
}

/// Periodic status snapshot of a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReport {
    pub id: RecordId,
    pub site_id: String,
    pub occupancy_count: u32,
    pub medical_needs_count: u32,
    pub supply_level: SupplyLevel,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    pub sync: SyncMeta,
}

impl FieldReport {
    #[must_use]
    pub fn new(
        site_id: impl Into<String>,
        occupancy_count: u32,
        medical_needs_count: u32,
        supply_level: SupplyLevel,
    ) -> Self {
        Self {
            id: RecordId::new(),
            site_id: site_id.into(),
            occupancy_count,
            medical_needs_count,
            supply_level,
            created_at: unix_millis_now(),
            sync: SyncMeta::default(),
        }
    }

    pub(crate) fn payload(&self, device_id: &str) -> serde_json::Value {
        json!({
            "site_id": self.site_id,
            "occupancy_count": self.occupancy_count,
            "medical_needs_count": self.medical_needs_count,
            "supply_level": self.supply_level,
            "occurred_at": millis_to_rfc3339(self.created_at),
            "device_id": device_id,
        })
    }
}

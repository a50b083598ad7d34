//! Provisional user self-registration model

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{RecordId, SyncMeta};
use crate::util::unix_millis_now;

/// A user registration captured on the device, awaiting central approval
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistration {
    pub id: RecordId,
    pub display_name: String,
    /// Requested login name; unique among registrations
    pub username: String,
    /// Credential hash produced by the UI; never the raw secret
    pub credential_hash: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    pub sync: SyncMeta,
}

impl std::fmt::Debug for UserRegistration {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("UserRegistration")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("username", &self.username)
            .field("credential_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("sync", &self.sync)
            .finish()
    }
}

impl UserRegistration {
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        username: impl Into<String>,
        credential_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            display_name: display_name.into(),
            username: username.into(),
            credential_hash: credential_hash.into(),
            created_at: unix_millis_now(),
            sync: SyncMeta::default(),
        }
    }

    pub(crate) fn payload(&self) -> serde_json::Value {
        json!({
            "display_name": self.display_name,
            "username": self.username,
            "credential_hash": self.credential_hash,
        })
    }
}

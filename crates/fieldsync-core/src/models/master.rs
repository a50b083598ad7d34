//! Master data mirrored from the central server

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical identifier assigned by the central server.
///
/// Opaque to the device. The wire may carry it as a JSON string or integer;
/// locally it is always stored as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MasterId(String);

impl MasterId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MasterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MasterId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for MasterId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        let id = match WireId::deserialize(deserializer)? {
            WireId::Text(text) => text.trim().to_string(),
            WireId::Signed(number) => number.to_string(),
            WireId::Unsigned(number) => number.to_string(),
        };
        if id.is_empty() {
            return Err(serde::de::Error::custom("master id must not be empty"));
        }
        Ok(Self(id))
    }
}

/// A kind of supply handed out at the site (breakfast, water, blanket, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionItem {
    pub id: MasterId,
    /// Natural key, unique on both sides
    pub name: String,
    pub description: String,
}

/// Account role as assigned by the central server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    General,
    Admin,
    Rescuer,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Admin => "admin",
            Self::Rescuer => "rescuer",
        }
    }

    /// Parse a wire role, falling back to `General` for anything unrecognized.
    pub fn from_wire(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown role '{}' from central server; treating as general", value);
            Self::General
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "admin" => Ok(Self::Admin),
            "rescuer" => Ok(Self::Rescuer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Whether a role grants administrative access on the device
pub const fn has_admin_access(role: Role) -> bool {
    matches!(role, Role::Admin)
}

/// A user account mirrored from the central server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: MasterId,
    /// Natural key, unique on both sides
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub credential_hash: String,
    pub role: Role,
    pub is_active: bool,
}

impl fmt::Debug for UserAccount {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("UserAccount")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .field("credential_hash", &"[REDACTED]")
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .finish()
    }
}

impl UserAccount {
    pub const fn has_admin_access(&self) -> bool {
        has_admin_access(self.role)
    }
}

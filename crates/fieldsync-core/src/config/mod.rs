//! Device sync configuration.
//!
//! Provides the `SyncSettings` struct describing which central servers this
//! device talks to, how it identifies itself, and the request timeouts used by
//! a sync run.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_API_BASE_PATH: &str = "/api/";
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 2;
const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PULL_TIMEOUT_SECS: u64 = 15;

/// Relative endpoint paths on the central server, appended to the API base path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct EndpointPaths {
    pub checkin: String,
    pub field_report: String,
    pub registration: String,
    pub distribution_items: String,
    pub users: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            checkin: "checkin-sync/".to_string(),
            field_report: "field-report/".to_string(),
            registration: "register-field-user/".to_string(),
            distribution_items: "distribution-items/".to_string(),
            users: "get-all-users/".to_string(),
        }
    }
}

/// Settings for a device's sync runs.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    /// Candidate central server base URLs, highest priority first
    pub central_server_urls: Vec<String>,
    #[serde(default = "default_api_base_path")]
    pub api_base_path: String,
    /// Shared static token sent as a bearer credential
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_true")]
    pub verify_tls: bool,
    /// Management identifier of the site this device serves
    pub site_id: String,
    /// Unique name of this device
    pub device_id: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_push_timeout_secs")]
    pub push_timeout_secs: u64,
    #[serde(default = "default_pull_timeout_secs")]
    pub pull_timeout_secs: u64,
    /// Skip every stage when no candidate answers the connectivity probe
    #[serde(default)]
    pub skip_when_offline: bool,
    #[serde(default)]
    pub endpoints: EndpointPaths,
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("central_server_urls", &self.central_server_urls)
            .field("api_base_path", &self.api_base_path)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("verify_tls", &self.verify_tls)
            .field("site_id", &self.site_id)
            .field("device_id", &self.device_id)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .field("push_timeout_secs", &self.push_timeout_secs)
            .field("pull_timeout_secs", &self.pull_timeout_secs)
            .field("skip_when_offline", &self.skip_when_offline)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

fn default_api_base_path() -> String {
    DEFAULT_API_BASE_PATH.to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_probe_timeout_secs() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

const fn default_push_timeout_secs() -> u64 {
    DEFAULT_PUSH_TIMEOUT_SECS
}

const fn default_pull_timeout_secs() -> u64 {
    DEFAULT_PULL_TIMEOUT_SECS
}

impl SyncSettings {
    /// Create settings with defaults for everything but identity and servers
    pub fn new(
        central_server_urls: Vec<String>,
        site_id: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            central_server_urls,
            api_base_path: default_api_base_path(),
            api_token: None,
            verify_tls: true,
            site_id: site_id.into(),
            device_id: device_id.into(),
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            push_timeout_secs: DEFAULT_PUSH_TIMEOUT_SECS,
            pull_timeout_secs: DEFAULT_PULL_TIMEOUT_SECS,
            skip_when_offline: false,
            endpoints: EndpointPaths::default(),
        }
    }

    /// Parse settings from a JSON document and validate them.
    pub fn from_json(payload: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid settings JSON: {error}")))?;
        settings.validated()
    }

    /// Load settings from a JSON file and validate them.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "failed to read settings at {}: {error}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    /// Write settings as pretty JSON, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Normalize whitespace and URL shapes, then check required values.
    pub fn validated(mut self) -> Result<Self> {
        self.normalize();
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.central_server_urls.is_empty() {
            return Err(Error::Config(
                "at least one central server URL is required".to_string(),
            ));
        }
        if let Some(url) = self
            .central_server_urls
            .iter()
            .find(|url| !is_http_url(url))
        {
            return Err(Error::Config(format!(
                "central server URL '{url}' must include http:// or https://"
            )));
        }
        if self.site_id.is_empty() {
            return Err(Error::Config("site_id must not be empty".to_string()));
        }
        if self.device_id.is_empty() {
            return Err(Error::Config("device_id must not be empty".to_string()));
        }
        if self.probe_timeout_secs == 0 || self.push_timeout_secs == 0 || self.pull_timeout_secs == 0
        {
            return Err(Error::Config("timeouts must be at least one second".to_string()));
        }
        Ok(())
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub const fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }

    pub const fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    /// Join a resolved base URL with the API base path and an endpoint path.
    pub fn endpoint_url(&self, base_url: &str, path: &str) -> String {
        format!(
            "{}{}{}",
            base_url.trim_end_matches('/'),
            self.api_base_path,
            path.trim_start_matches('/')
        )
    }

    fn normalize(&mut self) {
        self.central_server_urls = std::mem::take(&mut self.central_server_urls)
            .into_iter()
            .filter_map(|url| normalize_text_option(Some(url)))
            .map(|url| url.trim_end_matches('/').to_string())
            .collect();
        self.api_base_path = normalize_api_base_path(&self.api_base_path);
        self.api_token = normalize_text_option(self.api_token.take());
        self.site_id = self.site_id.trim().to_string();
        self.device_id = self.device_id.trim().to_string();
    }
}

/// Ensure the base path starts and ends with a single `/`.
fn normalize_api_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

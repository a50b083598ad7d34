//! Locating and loading the device's sync settings.

use std::env;
use std::path::{Path, PathBuf};

use fieldsync_core::util::normalize_text_option;
use fieldsync_core::SyncSettings;

use crate::error::CliError;

const APP_DIR: &str = "fieldsync";
const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "fieldsync.db";

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE_NAME)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(DB_FILE_NAME)
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path.unwrap_or_else(default_config_path)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("FIELDSYNC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

/// Settings values taken from `FIELDSYNC_*` environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub central_urls: Option<Vec<String>>,
    pub site_id: Option<String>,
    pub device_id: Option<String>,
    pub api_token: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let central_urls = normalize_text_option(lookup("FIELDSYNC_CENTRAL_URLS")).map(|raw| {
            raw.split(',')
                .filter_map(|url| normalize_text_option(Some(url.to_string())))
                .collect::<Vec<_>>()
        });

        Self {
            central_urls: central_urls.filter(|urls| !urls.is_empty()),
            site_id: normalize_text_option(lookup("FIELDSYNC_SITE_ID")),
            device_id: normalize_text_option(lookup("FIELDSYNC_DEVICE_ID")),
            api_token: normalize_text_option(lookup("FIELDSYNC_API_TOKEN")),
        }
    }

    /// Layer these values over `base`, or build settings from them alone.
    pub fn apply(self, base: Option<SyncSettings>) -> Option<SyncSettings> {
        let mut settings = match base {
            Some(settings) => settings,
            None => SyncSettings::new(
                self.central_urls.clone()?,
                self.site_id.clone()?,
                self.device_id.clone()?,
            ),
        };

        if let Some(urls) = self.central_urls {
            settings.central_server_urls = urls;
        }
        if let Some(site_id) = self.site_id {
            settings.site_id = site_id;
        }
        if let Some(device_id) = self.device_id {
            settings.device_id = device_id;
        }
        if let Some(token) = self.api_token {
            settings.api_token = Some(token);
        }
        Some(settings)
    }
}

/// Effective settings: the settings file (if any) with environment overrides.
pub fn load_settings(path: &Path) -> Result<SyncSettings, CliError> {
    load_settings_with(path, EnvOverrides::from_env())
}

pub fn load_settings_with(path: &Path, overrides: EnvOverrides) -> Result<SyncSettings, CliError> {
    let base = if path.exists() {
        Some(SyncSettings::load_from_path(path)?)
    } else {
        None
    };

    let settings = overrides
        .apply(base)
        .ok_or_else(|| CliError::NotConfigured(path.to_path_buf()))?;
    Ok(settings.validated()?)
}

/// Settings as JSON with the API token masked
pub fn redacted_settings_json(settings: &SyncSettings) -> Result<serde_json::Value, CliError> {
    let mut value = serde_json::to_value(settings)?;
    if settings.api_token.is_some() {
        value["api_token"] = serde_json::Value::String("[REDACTED]".to_string());
    }
    Ok(value)
}

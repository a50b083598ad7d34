use std::path::Path;

use fieldsync_core::SyncSettings;

use crate::cli::ConfigCommands;
use crate::config_file::{load_settings, redacted_settings_json};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            central_urls,
            site_id,
            device_id,
            api_token,
            api_base_path,
            insecure,
            skip_when_offline,
            force,
        } => {
            if config_path.exists() && !force {
                return Err(CliError::ConfigExists(config_path.to_path_buf()));
            }

            let mut settings = SyncSettings::new(central_urls, site_id, device_id);
            settings.api_token = api_token;
            if let Some(api_base_path) = api_base_path {
                settings.api_base_path = api_base_path;
            }
            settings.verify_tls = !insecure;
            settings.skip_when_offline = skip_when_offline;

            let settings = settings.validated()?;
            settings.save_to_path(config_path)?;
            println!("Wrote settings to {}", config_path.display());
        }
        ConfigCommands::Show => {
            let settings = load_settings(config_path)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&redacted_settings_json(&settings)?)?
            );
        }
    }
    Ok(())
}

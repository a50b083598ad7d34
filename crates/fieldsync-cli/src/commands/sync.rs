use std::path::Path;
use std::sync::Arc;

use fieldsync_core::sync::HttpTransport;
use fieldsync_core::SyncRunner;

use crate::commands::common::{format_summary_lines, open_database};
use crate::config_file::load_settings;
use crate::error::CliError;

pub async fn run_sync(config_path: &Path, db_path: &Path, as_json: bool) -> Result<(), CliError> {
    let settings = load_settings(config_path)?;
    let db = Arc::new(open_database(db_path).await?);
    let transport = HttpTransport::new(&settings)?;
    let runner = SyncRunner::new(db, transport, settings)?;

    let job = runner.submit()?;
    let summary = job.wait().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for line in format_summary_lines(&summary) {
            println!("{line}");
        }
    }
    Ok(())
}

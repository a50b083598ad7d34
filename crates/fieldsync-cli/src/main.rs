//! fieldsync CLI - buffer site records and sync them with the central server
//!
//! Stands in for the field UI on headless edge devices and gives operators a
//! way to trigger and inspect sync runs.

mod cli;
mod commands;
mod config_file;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::config::run_config;
use crate::commands::master::{run_items, run_users};
use crate::commands::record::run_record;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::config_file::{resolve_config_path, resolve_db_path};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "fieldsync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Commands::Sync { json } => run_sync(&config_path, &db_path, json).await?,
        Commands::Status { json } => run_status(&db_path, json).await?,
        Commands::Record { command } => run_record(command, &config_path, &db_path).await?,
        Commands::Items { json } => run_items(&db_path, json).await?,
        Commands::Users { json } => run_users(&db_path, json).await?,
        Commands::Config { command } => run_config(command, &config_path)?,
    }

    Ok(())
}

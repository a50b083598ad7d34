use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fieldsync_core::models::SupplyLevel;

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(about = "Buffer site records and synchronize them with the central server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the sync settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a sync job now and print its summary
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show pending/synced counts and recent failures per record type
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Buffer a new record for the next sync
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },
    /// List distribution items mirrored from the central server
    Items {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List user accounts mirrored from the central server
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage sync settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Record a subject entering (or leaving) the site
    Checkin {
        /// Scanned login id of the subject
        subject: String,
        /// Record a checkout instead of a checkin
        #[arg(long)]
        checkout: bool,
        /// Site id override (defaults to the configured site)
        #[arg(long, value_name = "ID")]
        site: Option<String>,
    },
    /// Record a site status report
    Report {
        /// Number of people currently at the site
        #[arg(long, value_name = "N")]
        occupancy: u32,
        /// Number of people with medical needs
        #[arg(long, value_name = "N")]
        medical: u32,
        /// Supply level: safe, warning, or critical
        #[arg(long, value_name = "LEVEL")]
        supply: SupplyLevel,
        /// Site id override (defaults to the configured site)
        #[arg(long, value_name = "ID")]
        site: Option<String>,
    },
    /// Record a field user self-registration
    Register {
        #[arg(long)]
        username: String,
        #[arg(long, value_name = "NAME")]
        display_name: String,
        /// Credential hash produced by the field UI
        #[arg(long, value_name = "HASH")]
        credential_hash: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a settings file
    Init {
        /// Central server base URL; repeat in priority order
        #[arg(long = "central-url", value_name = "URL", required = true)]
        central_urls: Vec<String>,
        /// Site this device serves
        #[arg(long, value_name = "ID")]
        site_id: String,
        /// Unique name of this device
        #[arg(long, value_name = "ID")]
        device_id: String,
        /// Shared API token sent as a bearer credential
        #[arg(long, value_name = "TOKEN")]
        api_token: Option<String>,
        /// API path prefix on the central server
        #[arg(long, value_name = "PATH")]
        api_base_path: Option<String>,
        /// Accept self-signed central server certificates
        #[arg(long)]
        insecure: bool,
        /// Skip every stage when no central server answers
        #[arg(long)]
        skip_when_offline: bool,
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
    /// Print effective settings (token redacted)
    Show,
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use inventory_report::credentials::validate_entry;

#[derive(Parser, Debug)]
#[command(
    name = "inventory-report",
    version,
    about = "Export HighLevel inventory to Excel"
)]
pub struct Cli {
    /// Settings file (TOML/JSON/YAML); defaults to ./inventory-report.toml if present
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Credential file, searched after ./.env and the executable's directory
    #[arg(short, long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Authorize with HighLevel through the browser and store the token
    Authorize {
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Seconds to wait for the browser redirect
        #[arg(short, long)]
        timeout: Option<u64>,

        /// OAuth client id (overrides CLIENT_ID from the credential file)
        #[arg(long, env = "INVENTORY_REPORT_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (overrides CLIENT_SECRET from the credential file)
        #[arg(long, env = "INVENTORY_REPORT_CLIENT_SECRET", hide_env_values = true)]
        client_secret: Option<String>,
    },

    /// Show which credentials are configured (default)
    Status,

    /// Credential file management
    Credentials {
        #[command(subcommand)]
        action: CredentialCommands,
    },

    /// Request a single item to verify token, location and endpoint
    TestConnection,

    /// Fetch inventory and optionally export it to Excel
    Fetch {
        /// Items per page (max 300); defaults to API_LIMIT
        #[arg(short, long)]
        limit: Option<u32>,

        /// Pagination offset; defaults to API_OFFSET
        #[arg(short, long)]
        offset: Option<u32>,

        /// Follow pages until the inventory is exhausted
        #[arg(short, long)]
        all: bool,

        /// Write the report to this path (implies --export)
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,

        /// Export to a timestamped report in the working directory
        #[arg(long)]
        export: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CredentialCommands {
    /// Set one or more KEY=VALUE entries, keeping the rest of the file intact
    Set {
        #[arg(required = true, value_parser = parse_assignment)]
        entries: Vec<(String, String)>,
    },
}

/// Parse a `KEY=VALUE` argument
fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;

    let (key, value) = (key.trim(), value.trim());
    validate_entry(key, value).map_err(|e| e.to_string())?;

    Ok((key.to_string(), value.to_string()))
}

impl Cli {
    /// Get the command to execute, defaulting to Status if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Status)
    }
}

//! # tally-cli
//!
//! Read and write a user's settings document from the command line.
//!
//! ```bash
//! export TALLY_SUPABASE_URL=https://abc.supabase.co
//! export TALLY_SUPABASE_KEY=...
//!
//! tally --user u-1 settings get
//! tally --user u-1 settings get --path security.twoFactorEnabled
//! tally --user u-1 settings set preferences.theme '"dark"'
//! tally --user u-1 settings replace '{"currency": "EUR"}'
//! ```

pub mod commands;

pub use commands::{execute, run, CliError};

use clap::{Parser, Subcommand};

/// Tally - per-user settings from the command line
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// User whose settings are read or written
    #[arg(long, env = "TALLY_USER_ID")]
    pub user: Option<String>,

    /// Log filter, e.g. `debug` or `tally_fetch=debug`
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Per-attempt request timeout (overrides TALLY_FETCH_TIMEOUT_MS)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Retries after the first attempt (overrides TALLY_FETCH_RETRIES)
    #[arg(long)]
    pub retries: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Work with the settings document
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum SettingsCommand {
    /// Print the whole document, or one value with --path
    Get {
        #[arg(long)]
        path: Option<String>,
    },

    /// Write one value at a dotted path
    Set {
        path: String,
        /// JSON value; anything that is not valid JSON is stored as a string
        value: String,
    },

    /// Replace the whole document with a JSON object
    Replace { document: String },

    /// Print the document, creating it from the given defaults if absent
    Init {
        #[arg(default_value = "{}")]
        defaults: String,
    },
}

//! Loadkit CLI Library
//!
//! Operator tooling around the loadkit coordination core.
//!
//! # Overview
//!
//! - **Row claims**: Hand out the next rows of a data pool (`loadkit claim`)
//! - **Pointers**: Inspect or rewind a pool's pointer (`loadkit pointer show/reset`)
//! - **Tokens**: Fetch a bearer token through the credential cache (`loadkit token`)
//! - **Correlation**: Apply correlation rules to a captured response (`loadkit correlate`)
//! - **Drain**: Run virtual users against a pool until the run stops (`loadkit drain`)

pub mod commands;
pub mod error;

// Re-export commonly used types
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use loadkit_core::config::parse_delimiter;
use loadkit_core::CoordinatorConfig;
use std::path::PathBuf;

/// Loadkit - test-data coordination for load-test workers
#[derive(Parser, Debug)]
#[command(name = "loadkit")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding pointer files
    #[arg(long, env = "LOADKIT_POINTER_DIR", global = true)]
    pub pointer_dir: Option<PathBuf>,

    /// Run id shared by all workers of a run
    #[arg(long, env = "LOADKIT_RUN_ID", global = true)]
    pub run_id: Option<String>,

    /// Field delimiter of source files (one character, or "tab")
    #[arg(long, env = "LOADKIT_DELIMITER", global = true)]
    pub delimiter: Option<String>,
}

impl Cli {
    /// Coordinator configuration: environment first, then command-line flags
    pub fn coordinator_config(&self) -> Result<CoordinatorConfig> {
        let mut config = CoordinatorConfig::from_env()?;

        if let Some(dir) = &self.pointer_dir {
            config.pointer_dir = dir.clone();
        }
        if let Some(run_id) = &self.run_id {
            config.set_run_id(run_id.clone())?;
        }
        if let Some(delimiter) = &self.delimiter {
            config.delimiter = parse_delimiter(delimiter)?;
        }

        Ok(config)
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Claim the next row(s) of a data pool and print them as JSON
    Claim {
        /// Source data file
        #[arg(short, long)]
        source: PathBuf,

        /// Variable names, mapped to fields by position
        #[arg(short, long, default_value = "value")]
        columns: String,

        /// Rewind the pointer first (once per run id)
        #[arg(long)]
        reset: bool,

        /// Number of rows to claim
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Inspect or rewind pointers
    Pointer {
        #[command(subcommand)]
        command: PointerCommand,
    },

    /// Fetch a bearer token with a client-credentials exchange
    Token {
        #[arg(long, env = "LOADKIT_CLIENT_ID")]
        client_id: String,

        #[arg(long, env = "LOADKIT_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,

        /// Token endpoint URL
        #[arg(long, env = "LOADKIT_TOKEN_ENDPOINT")]
        endpoint: String,
    },

    /// Apply correlation rules to a captured JSON response
    Correlate {
        /// Captured response (JSON file)
        #[arg(short, long)]
        input: PathBuf,

        /// Rules (JSON array file)
        #[arg(short, long)]
        rules: PathBuf,

        /// Path of the array inside the response
        #[arg(short, long, default_value = "")]
        path: String,

        /// Seed for RANDOM selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run virtual users that claim rows until the run stops
    Drain {
        /// Source data file
        #[arg(short, long)]
        source: PathBuf,

        /// Variable names, mapped to fields by position
        #[arg(short, long, default_value = "value")]
        columns: String,

        /// Number of concurrent virtual users
        #[arg(short, long, default_value_t = 4)]
        users: usize,

        /// Rewind the pointer at run start (once per run id)
        #[arg(long)]
        reset: bool,

        /// Stop after this many failed iterations
        #[arg(long, env = "LOADKIT_MAX_FAILURES", default_value_t = 10)]
        max_failures: u64,
    },
}

/// Pointer subcommands
#[derive(Subcommand, Debug)]
pub enum PointerCommand {
    /// Show the pointer of a source file
    Show {
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Set the pointer of a source file back to 0
    Reset {
        #[arg(short, long)]
        source: PathBuf,
    },
}

//! CLI argument definitions using clap
//!
//! Commands:
//! - txnmgr run --script <path> [--config <path>]
//! - txnmgr check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// txnmgr - serialized transactions with undo/redo
#[derive(Parser, Debug)]
#[command(name = "txnmgr")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a JSON script of operations against an in-memory store
    Run {
        /// Path to the script file
        #[arg(long)]
        script: PathBuf,

        /// Path to configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./txnmgr.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

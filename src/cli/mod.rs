//! CLI module for txnmgr
//!
//! Provides command-line interface for:
//! - run: Replay a JSON script of store operations and print a report
//! - check-config: Validate a configuration file

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{
    check_config, load_script, run, run_command, run_script, run_script_file, EntryReport,
    HistoryReport, RunReport, ScriptOp, StepReport,
};
pub use errors::{CliError, CliErrorCode, CliResult};

//! CLI command implementations
//!
//! `run` replays a JSON script against a fresh in-memory store and prints a
//! report of what happened. `check-config` validates a config file.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::TxnConfig;
use crate::kv::{KvStore, PutEntry, RemoveEntry, RenameEntry};
use crate::observability::{LogTarget, Logger, TxnMetricsSnapshot};
use crate::txn::{BatchItem, TransactionManager, TxnError, TxnHandle, TxnResult};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// One scripted operation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    Put {
        key: String,
        value: Value,
    },
    Remove {
        key: String,
    },
    Rename {
        from: String,
        to: String,
    },
    Undo,
    Redo,
    Clear {
        #[serde(default = "default_true")]
        undo: bool,
        #[serde(default = "default_true")]
        redo: bool,
    },
    /// Items must be put, remove or rename
    Batch {
        #[serde(default)]
        name: Option<String>,
        items: Vec<ScriptOp>,
    },
}

fn default_true() -> bool {
    true
}

impl ScriptOp {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptOp::Put { .. } => "put",
            ScriptOp::Remove { .. } => "remove",
            ScriptOp::Rename { .. } => "rename",
            ScriptOp::Undo => "undo",
            ScriptOp::Redo => "redo",
            ScriptOp::Clear { .. } => "clear",
            ScriptOp::Batch { .. } => "batch",
        }
    }
}

/// Outcome of one script step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub index: usize,
    pub committed_at: DateTime<Utc>,
    /// Newest first
    pub transactions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    pub length: usize,
    pub undo_position: usize,
    pub entries: Vec<EntryReport>,
}

/// Everything `txnmgr run` prints
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
    pub store: BTreeMap<String, Value>,
    pub history: HistoryReport,
    pub metrics: TxnMetricsSnapshot,
}

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args.
///
/// Commands print JSON on stdout, so log lines are moved to stderr.
pub fn run_command(cmd: Command) -> CliResult<()> {
    Logger::set_target(LogTarget::Stderr);
    match cmd {
        Command::Run { script, config } => run_script_file(&script, config.as_deref()),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Load a script file
pub fn load_script(path: &Path) -> CliResult<Vec<ScriptOp>> {
    let content = fs::read_to_string(path).map_err(|e| {
        CliError::script_error(format!("Failed to read script {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::script_error(format!("Invalid script JSON: {}", e)))
}

fn load_config(path: Option<&Path>) -> CliResult<TxnConfig> {
    match path {
        Some(path) => Ok(TxnConfig::load(path)?),
        None => Ok(TxnConfig::default()),
    }
}

/// `txnmgr run`
pub fn run_script_file(script: &Path, config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config)?;
    Logger::set_min_severity(config.severity()?);
    let ops = load_script(script)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;
    let report = rt.block_on(run_script(config, ops))?;

    write_json(&report)
}

/// `txnmgr check-config`
pub fn check_config(path: &Path) -> CliResult<()> {
    let config = TxnConfig::load(path)?;
    write_json(&config)
}

fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::io_error(format!("Failed to serialize output: {}", e)))?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}

/// Replay `ops` against a fresh store and manager.
///
/// Step failures are recorded in the report and do not stop the script.
pub async fn run_script(config: TxnConfig, ops: Vec<ScriptOp>) -> CliResult<RunReport> {
    let manager = TransactionManager::new(config)?;
    let store = KvStore::new();
    let mut steps = Vec::with_capacity(ops.len());

    for (index, op) in ops.iter().enumerate() {
        let outcome = run_op(&manager, &store, op).await;
        steps.push(match outcome {
            Ok(result) => StepReport {
                index,
                op: op.name(),
                ok: true,
                result: Some(result),
                error: None,
            },
            Err(e) => StepReport {
                index,
                op: op.name(),
                ok: false,
                result: None,
                error: Some(format!("{}: {}", e.code(), e)),
            },
        });
    }

    manager.shutdown().await;

    let entries = (0..manager.len())
        .map(|index| -> TxnResult<EntryReport> {
            let entry = manager.entry(index)?;
            Ok(EntryReport {
                index,
                committed_at: entry.committed_at(),
                transactions: entry.describe(),
            })
        })
        .collect::<TxnResult<Vec<_>>>()?;

    Ok(RunReport {
        generated_at: Utc::now(),
        steps,
        store: store.snapshot(),
        history: HistoryReport {
            length: manager.len(),
            undo_position: manager.undo_position(),
            entries,
        },
        metrics: manager.metrics(),
    })
}

async fn run_op(manager: &TransactionManager, store: &KvStore, op: &ScriptOp) -> TxnResult<Value> {
    match op {
        ScriptOp::Undo => {
            manager.undo().await;
            Ok(Value::Null)
        }
        ScriptOp::Redo => {
            manager.redo().await;
            Ok(Value::Null)
        }
        ScriptOp::Clear { undo, redo } => {
            manager.clear_history(*undo, *redo).await?;
            Ok(Value::Null)
        }
        ScriptOp::Batch { name, items } => {
            let items = items
                .iter()
                .map(|item| register_op(manager, store, item).map(BatchItem::from))
                .collect::<TxnResult<Vec<_>>>()?;
            let results = manager
                .batch_named(name.as_deref().unwrap_or("batch"), items)
                .await?;
            Ok(Value::Array(
                results
                    .into_iter()
                    .map(|r| r.unwrap_or(Value::Null))
                    .collect(),
            ))
        }
        single => {
            let handle = register_op(manager, store, single)?;
            manager.transact(&handle).await
        }
    }
}

fn register_op(manager: &TransactionManager, store: &KvStore, op: &ScriptOp) -> TxnResult<TxnHandle> {
    match op {
        ScriptOp::Put { key, value } => Ok(manager.register(PutEntry::new(store, key, value.clone())?)),
        ScriptOp::Remove { key } => Ok(manager.register(RemoveEntry::new(store, key)?)),
        ScriptOp::Rename { from, to } => Ok(manager.register(RenameEntry::new(store, from, to)?)),
        other => Err(TxnError::invalid_input(format!(
            "{} cannot be used as a batch item",
            other.name()
        ))),
    }
}

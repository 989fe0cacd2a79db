//! CLI Script Tests
//!
//! Script files and config files as the `txnmgr` binary reads them.

use std::io::Write;
use std::process::Command;

use serde_json::json;
use tempfile::NamedTempFile;

use txnmgr::cli::{check_config, load_script, run_script, run_script_file, CliErrorCode, ScriptOp};
use txnmgr::TxnConfig;

fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_script_file_round_trip() {
    let script = temp_file(
        r#"[
            {"op": "put", "key": "title", "value": "draft"},
            {"op": "put", "key": "title", "value": "final"},
            {"op": "undo"},
            {"op": "batch", "name": "tidy", "items": [
                {"op": "rename", "from": "title", "to": "name"},
                {"op": "put", "key": "tag", "value": ["a"]}
            ]},
            {"op": "clear", "undo": false}
        ]"#,
    );

    let ops = load_script(script.path()).unwrap();
    assert_eq!(ops.len(), 5);
    assert!(matches!(ops[4], ScriptOp::Clear { undo: false, redo: true }));

    let report = run_script(TxnConfig::default(), ops).await.unwrap();

    assert!(report.steps.iter().all(|s| s.ok));
    assert_eq!(report.store.get("name"), Some(&json!("draft")));
    assert_eq!(report.store.get("tag"), Some(&json!(["a"])));
    assert_eq!(report.history.length, 2);
    assert_eq!(report.history.undo_position, 0);
    assert_eq!(
        report.history.entries[0].transactions,
        vec!["Put(tag)", "Rename(title -> name)"]
    );

    let printed = serde_json::to_value(&report).unwrap();
    assert_eq!(printed["metrics"]["committed"], json!(4));
    assert!(printed["steps"][0].get("error").is_none());
}

#[test]
fn test_run_script_file_with_config() {
    let script = temp_file(r#"[{"op": "put", "key": "k", "value": 1}]"#);
    let config = temp_file(r#"{"queue_timeout_ms": 1000, "log_level": "error"}"#);

    run_script_file(script.path(), Some(config.path())).unwrap();
}

#[test]
fn test_missing_script_reported() {
    let err = run_script_file(std::path::Path::new("/nonexistent/ops.json"), None).unwrap_err();
    assert_eq!(err.code(), &CliErrorCode::ScriptError);
}

#[test]
fn test_check_config() {
    let good = temp_file(r#"{"queue_name": "Bookmarks"}"#);
    check_config(good.path()).unwrap();

    let bad = temp_file(r#"{"queue_timeout_ms": 0}"#);
    let err = check_config(bad.path()).unwrap_err();
    assert_eq!(err.code(), &CliErrorCode::ConfigError);
    assert!(err.to_string().starts_with("TXN_CLI_CONFIG_ERROR"));
}

#[test]
fn test_binary_stdout_is_only_the_report() {
    let script = temp_file(
        r#"[{"op": "put", "key": "a", "value": 1}, {"op": "undo"}, {"op": "redo"}]"#,
    );

    let output = Command::new(env!("CARGO_BIN_EXE_txnmgr"))
        .arg("run")
        .arg("--script")
        .arg(script.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["store"], json!({"a": 1}));
    assert_eq!(report["history"]["length"], json!(1));

    // Info-level lines still reach stderr
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.lines().any(|line| line.contains("TXN_COMMIT")));
}

#[test]
fn test_binary_check_config_stdout_is_json() {
    let config = temp_file(r#"{"queue_timeout_ms": 1500}"#);

    let output = Command::new(env!("CARGO_BIN_EXE_txnmgr"))
        .args(["check-config", "--config"])
        .arg(config.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let printed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed["queue_timeout_ms"], json!(1500));
}

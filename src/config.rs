//! Transaction manager configuration
//!
//! Loaded from a JSON file; every field has a default so `{}` is valid.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observability::{log_event, Severity, TxnEvent};
use crate::txn::{TxnError, TxnResult};

/// Transaction manager configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxnConfig {
    /// Per-task deadline in milliseconds (default: 4 minutes)
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,

    /// Queue name used in log fields (default: "MainEnqueuer")
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Minimum log level: trace, info, warn or error (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_queue_timeout_ms() -> u64 {
    240_000
}

fn default_queue_name() -> String {
    "MainEnqueuer".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TxnConfig {
    fn default() -> Self {
        Self {
            queue_timeout_ms: default_queue_timeout_ms(),
            queue_name: default_queue_name(),
            log_level: default_log_level(),
        }
    }
}

impl TxnConfig {
    /// Create a default config with the given queue deadline
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            queue_timeout_ms: timeout.as_millis() as u64,
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> TxnResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| TxnError::Config(format!("Failed to read config: {}", e)))?;

        let config: TxnConfig = serde_json::from_str(&content)
            .map_err(|e| TxnError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        log_event(
            TxnEvent::ConfigLoaded,
            &[
                ("path", &path.display().to_string()),
                ("queue_timeout_ms", &config.queue_timeout_ms.to_string()),
            ],
        );

        Ok(config)
    }

    /// Validate field values
    pub fn validate(&self) -> TxnResult<()> {
        if self.queue_timeout_ms == 0 {
            return Err(TxnError::Config(
                "queue_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.queue_name.trim().is_empty() {
            return Err(TxnError::Config("queue_name must not be empty".to_string()));
        }
        self.severity()?;
        Ok(())
    }

    /// Per-task deadline
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    /// Parsed log level
    pub fn severity(&self) -> TxnResult<Severity> {
        Severity::parse(&self.log_level)
            .ok_or_else(|| TxnError::Config(format!("Unknown log_level: {}", self.log_level)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TxnConfig::default();
        assert_eq!(config.queue_timeout(), Duration::from_secs(240));
        assert_eq!(config.queue_name, "MainEnqueuer");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: TxnConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TxnConfig::default());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = TxnConfig {
            queue_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TxnError::Config(_))));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let config = TxnConfig {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TxnError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"queue_timeout_ms": 500, "log_level": "warn"}}"#).unwrap();

        let config = TxnConfig::load(file.path()).unwrap();
        assert_eq!(config.queue_timeout(), Duration::from_millis(500));
        assert_eq!(config.severity().unwrap(), Severity::Warn);
        assert_eq!(config.queue_name, "MainEnqueuer");
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            TxnConfig::load(file.path()),
            Err(TxnError::Config(_))
        ));
    }
}

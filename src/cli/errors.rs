//! CLI-specific error types

use std::fmt;
use std::io;

use crate::txn::TxnError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// Script file unreadable or malformed
    ScriptError,
    /// I/O error (files, stdout)
    IoError,
    /// Runtime or manager failed to start
    BootFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "TXN_CLI_CONFIG_ERROR",
            Self::ScriptError => "TXN_CLI_SCRIPT_ERROR",
            Self::IoError => "TXN_CLI_IO_ERROR",
            Self::BootFailed => "TXN_CLI_BOOT_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn script_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ScriptError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<TxnError> for CliError {
    fn from(e: TxnError) -> Self {
        match e {
            TxnError::Config(msg) => Self::config_error(msg),
            TxnError::InvalidInput(msg) => Self::script_error(msg),
            other => Self::boot_failed(other.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

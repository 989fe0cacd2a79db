//! # Transaction Errors

use thiserror::Error;

/// Result type for transaction operations
pub type TxnResult<T> = Result<T, TxnError>;

/// Transaction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxnError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Handle was not registered with this transaction manager")]
    InvalidHandle,

    #[error("Transaction objects may not be recycled: {0}")]
    AlreadyExecuted(String),

    #[error("Execution failure: {0}")]
    ExecutionFailure(String),

    #[error("Transaction cannot be undone: {0}")]
    NotUndoable(String),

    #[error("Transaction timeout after {0}ms, most likely caused by unresolved pending work")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid index {index} for history of length {length}")]
    IndexOutOfRange { index: usize, length: usize },

    #[error("Transaction queue is closed")]
    QueueClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TxnError {
    /// Create an execution failure
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::ExecutionFailure(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Stable error code used in log fields
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "TXN_INVALID_INPUT",
            Self::InvalidHandle => "TXN_INVALID_HANDLE",
            Self::AlreadyExecuted(_) => "TXN_ALREADY_EXECUTED",
            Self::ExecutionFailure(_) => "TXN_EXECUTION_FAILURE",
            Self::NotUndoable(_) => "TXN_NOT_UNDOABLE",
            Self::Timeout(_) => "TXN_TIMEOUT",
            Self::InvalidArgument(_) => "TXN_INVALID_ARGUMENT",
            Self::IndexOutOfRange { .. } => "TXN_INDEX_OUT_OF_RANGE",
            Self::QueueClosed => "TXN_QUEUE_CLOSED",
            Self::Config(_) => "TXN_CONFIG_ERROR",
        }
    }

    /// Whether resubmitting fresh work may succeed.
    ///
    /// Only a timeout says nothing about the work itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

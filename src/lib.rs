//! txnmgr - serialized transactions with undo/redo history
//!
//! Work units are submitted to a single ordered queue, executed one at a
//! time under a deadline, and recorded in a bounded two-dimensional
//! history that supports undo, redo and batching.

pub mod cli;
pub mod config;
pub mod kv;
pub mod observability;
pub mod txn;

pub use config::TxnConfig;
pub use txn::{
    BatchItem, BatchScope, CommandStateSink, HistoryEntry, TransactionManager, TxnError,
    TxnHandle, TxnResult, WorkFuture, WorkUnit,
};

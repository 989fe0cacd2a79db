//! # Transactions
//!
//! Serialized execution of undoable work units with a two-dimensional
//! undo/redo history.
//!
//! - [`SerializedQueue`] runs tasks one at a time, in call order, each
//!   bounded by a deadline.
//! - [`HistoryStore`] keeps committed handles grouped into entries, split
//!   into redo and undo sides by the undo position.
//! - [`TransactionManager`] ties both together: transact, batch, undo, redo
//!   and clear all go through the one queue.
//!
//! ```ignore
//! let manager = TransactionManager::new(TxnConfig::default())?;
//! let handle = manager.register(PutEntry::new(&store, "k", json!(1))?);
//! handle.transact().await?;
//! manager.undo().await;
//! ```

pub mod batch;
pub mod errors;
pub mod handle;
pub mod history;
pub mod manager;
pub mod notify;
pub mod queue;
pub mod work_unit;

pub use batch::{BatchItem, BatchScope, DeferredItem};
pub use errors::{TxnError, TxnResult};
pub use handle::{HandleId, TxnHandle};
pub use history::{HandleRegistry, HistoryEntry, HistoryStore};
pub use manager::TransactionManager;
pub use notify::{CommandStateSink, NoopSink};
pub use queue::{SerializedQueue, TaskGuard};
pub use work_unit::{WorkFuture, WorkUnit};

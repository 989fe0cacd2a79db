//! # Key/Value Work Units
//!
//! A small in-memory store and three undoable operations on it. Used by
//! the CLI and by tests as concrete work units.

mod store;
mod units;

pub use store::{validate_key, KvStore, MAX_KEY_LEN};
pub use units::{PutEntry, RemoveEntry, RenameEntry};

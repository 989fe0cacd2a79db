//! Reference work units over [`KvStore`]
//!
//! Each unit validates its input in its constructor and remembers what it
//! needs to revert itself when it executes.

use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use super::store::{validate_key, KvStore};
use crate::txn::{TxnError, TxnResult, WorkFuture, WorkUnit};

/// Store a value under a key
#[derive(Debug)]
pub struct PutEntry {
    store: KvStore,
    key: String,
    value: Value,
    previous: Mutex<Option<Value>>,
}

impl PutEntry {
    pub fn new(store: &KvStore, key: impl Into<String>, value: Value) -> TxnResult<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self {
            store: store.clone(),
            key,
            value,
            previous: Mutex::new(None),
        })
    }
}

impl WorkUnit for PutEntry {
    /// Resolves to the replaced value, or null
    fn execute(&self) -> WorkFuture<'_> {
        Box::pin(async move {
            let previous = self.store.insert(&self.key, self.value.clone());
            *self.previous.lock().unwrap_or_else(PoisonError::into_inner) = previous.clone();
            Ok(previous.unwrap_or(Value::Null))
        })
    }

    fn undo(&self) -> Option<WorkFuture<'_>> {
        Some(Box::pin(async move {
            let previous = self
                .previous
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            match previous {
                Some(value) => self.store.insert(&self.key, value),
                None => self.store.remove(&self.key),
            };
            Ok(Value::Null)
        }))
    }

    fn redo(&self) -> Option<WorkFuture<'_>> {
        Some(Box::pin(async move {
            self.store.insert(&self.key, self.value.clone());
            Ok(Value::Null)
        }))
    }

    fn describe(&self) -> String {
        format!("Put({})", self.key)
    }
}

/// Remove a key
#[derive(Debug)]
pub struct RemoveEntry {
    store: KvStore,
    key: String,
    removed: Mutex<Option<Value>>,
}

impl RemoveEntry {
    pub fn new(store: &KvStore, key: impl Into<String>) -> TxnResult<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self {
            store: store.clone(),
            key,
            removed: Mutex::new(None),
        })
    }

    fn remove(&self) -> TxnResult<Value> {
        let value = self
            .store
            .remove(&self.key)
            .ok_or_else(|| TxnError::execution(format!("no entry for key: {}", self.key)))?;
        *self.removed.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.clone());
        Ok(value)
    }
}

impl WorkUnit for RemoveEntry {
    /// Resolves to the removed value
    fn execute(&self) -> WorkFuture<'_> {
        Box::pin(async move { self.remove() })
    }

    fn undo(&self) -> Option<WorkFuture<'_>> {
        Some(Box::pin(async move {
            let removed = self
                .removed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .ok_or_else(|| TxnError::execution("nothing to restore"))?;
            self.store.insert(&self.key, removed);
            Ok(Value::Null)
        }))
    }

    fn redo(&self) -> Option<WorkFuture<'_>> {
        Some(Box::pin(async move { self.remove().map(|_| Value::Null) }))
    }

    fn describe(&self) -> String {
        format!("Remove({})", self.key)
    }
}

/// Move a value to another key. Redo re-runs `execute`.
#[derive(Debug)]
pub struct RenameEntry {
    store: KvStore,
    from: String,
    to: String,
}

impl RenameEntry {
    pub fn new(store: &KvStore, from: impl Into<String>, to: impl Into<String>) -> TxnResult<Self> {
        let (from, to) = (from.into(), to.into());
        validate_key(&from)?;
        validate_key(&to)?;
        if from == to {
            return Err(TxnError::invalid_input("rename source and target are equal"));
        }
        Ok(Self {
            store: store.clone(),
            from,
            to,
        })
    }
}

impl WorkUnit for RenameEntry {
    fn execute(&self) -> WorkFuture<'_> {
        Box::pin(async move {
            self.store.rename(&self.from, &self.to)?;
            Ok(Value::Null)
        })
    }

    fn undo(&self) -> Option<WorkFuture<'_>> {
        Some(Box::pin(async move {
            self.store.rename(&self.to, &self.from)?;
            Ok(Value::Null)
        }))
    }

    fn describe(&self) -> String {
        format!("Rename({} -> {})", self.from, self.to)
    }
}

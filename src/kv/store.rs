//! In-memory key/value store mutated by the reference work units

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::txn::{TxnError, TxnResult};

/// Longest accepted key, in bytes
pub const MAX_KEY_LEN: usize = 256;

/// Check a key before it is used in a work unit
pub fn validate_key(key: &str) -> TxnResult<()> {
    if key.is_empty() {
        return Err(TxnError::invalid_input("key must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(TxnError::invalid_input(format!(
            "key longer than {} bytes",
            MAX_KEY_LEN
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(TxnError::invalid_input("key contains control characters"));
    }
    Ok(())
}

/// Thread-safe ordered map; clones share the same data
#[derive(Debug, Clone, Default)]
pub struct KvStore {
    data: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Store a value, returning the one it replaced
    pub fn insert(&self, key: &str, value: Value) -> Option<Value> {
        self.write().insert(key.to_string(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.write().remove(key)
    }

    /// Move a value to a new key; fails if `from` is missing or `to` is taken
    pub fn rename(&self, from: &str, to: &str) -> TxnResult<()> {
        let mut data = self.write();
        if data.contains_key(to) {
            return Err(TxnError::execution(format!("key already exists: {}", to)));
        }
        let value = data
            .remove(from)
            .ok_or_else(|| TxnError::execution(format!("no entry for key: {}", from)))?;
        data.insert(to.to_string(), value);
        Ok(())
    }

    /// Copy of the whole map
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.read().clone()
    }
}

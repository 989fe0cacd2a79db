//! # Transactions History
//!
//! A two-dimensional stack: an ordered list of entries, each entry an
//! ordered list of handles committed together. Entries are kept newest
//! first, and so are the handles within an entry (the order they are
//! undone in).
//!
//! The undo position `p` splits the list:
//!
//! ```text
//! [ [2nd redo txn, 1st redo txn],  <= 2nd redo entry
//!   [2nd redo txn, 1st redo txn],  <= 1st redo entry (top redo, index p-1)
//!   [1st undo txn, 2nd undo txn],  <= 1st undo entry (top undo, index p)
//!   [1st undo txn, 2nd undo txn] ] <= 2nd undo entry
//! undo position: 2
//! ```
//!
//! Starting a new entry removes all redo entries.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::{TxnError, TxnResult};
use super::handle::{HandleId, TxnHandle};
use super::manager::ManagerShared;
use super::work_unit::WorkUnit;
use crate::observability::{log_event, TxnEvent};

const MIN_PRUNE_THRESHOLD: usize = 64;

/// Maps handles to the work units they stand for.
///
/// Holds only weak references: a unit lives as long as some handle to it
/// (or a history entry containing one) does.
pub struct HandleRegistry {
    owner: Uuid,
    next_id: u64,
    units: HashMap<HandleId, Weak<dyn WorkUnit>>,
    prune_threshold: usize,
}

impl HandleRegistry {
    /// Create an empty registry with a fresh owner id
    pub fn new() -> Self {
        Self {
            owner: Uuid::new_v4(),
            next_id: 1,
            units: HashMap::new(),
            prune_threshold: MIN_PRUNE_THRESHOLD,
        }
    }

    /// Owner id stamped on every handle
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// Wrap a unit in a new handle
    pub(crate) fn register(
        &mut self,
        unit: Arc<dyn WorkUnit>,
        manager: Weak<ManagerShared>,
    ) -> TxnHandle {
        if self.units.len() >= self.prune_threshold {
            self.units.retain(|_, weak| weak.strong_count() > 0);
            self.prune_threshold = (self.units.len() * 2).max(MIN_PRUNE_THRESHOLD);
        }

        let id = HandleId(self.next_id);
        self.next_id += 1;
        self.units.insert(id, Arc::downgrade(&unit));

        TxnHandle::new(id, self.owner, unit, manager)
    }

    /// Whether the handle was produced by this registry
    pub fn contains(&self, handle: &TxnHandle) -> bool {
        handle.owner() == self.owner && self.units.contains_key(&handle.id())
    }

    /// Look up the work unit behind a handle
    pub fn resolve(&self, handle: &TxnHandle) -> TxnResult<Arc<dyn WorkUnit>> {
        if handle.owner() != self.owner {
            return Err(TxnError::InvalidHandle);
        }
        self.units
            .get(&handle.id())
            .and_then(Weak::upgrade)
            .ok_or(TxnError::InvalidHandle)
    }

    /// Number of tracked registrations, live or not yet pruned
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles committed together, undone and redone as one step
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    handles: VecDeque<TxnHandle>,
    committed_at: DateTime<Utc>,
}

impl HistoryEntry {
    fn new(first: TxnHandle) -> Self {
        let mut handles = VecDeque::with_capacity(1);
        handles.push_back(first);
        Self {
            handles,
            committed_at: Utc::now(),
        }
    }

    /// Number of handles in the entry
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handle at `index`, in undo order
    pub fn get(&self, index: usize) -> Option<&TxnHandle> {
        self.handles.get(index)
    }

    /// Handles in undo order (newest first)
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TxnHandle> {
        self.handles.iter()
    }

    /// When the entry was started
    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }

    /// Handle descriptions in undo order
    pub fn describe(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.to_string()).collect()
    }
}

/// The undo/redo history plus the registry of its handles
pub struct HistoryStore {
    entries: VecDeque<HistoryEntry>,
    undo_position: usize,
    registry: HandleRegistry,
}

impl HistoryStore {
    /// Create an empty history
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            undo_position: 0,
            registry: HandleRegistry::new(),
        }
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut HandleRegistry {
        &mut self.registry
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the top undo entry; equals `len()` when nothing can be undone
    pub fn undo_position(&self) -> usize {
        self.undo_position
    }

    /// Entry at `index`
    pub fn entry(&self, index: usize) -> TxnResult<&HistoryEntry> {
        self.entries.get(index).ok_or(TxnError::IndexOutOfRange {
            index,
            length: self.entries.len(),
        })
    }

    /// Entry at the undo position, if any
    pub fn top_undo_entry(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.undo_position)
    }

    /// Entry just before the undo position, if any
    pub fn top_redo_entry(&self) -> Option<&HistoryEntry> {
        self.undo_position
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
    }

    /// Record a handle.
    ///
    /// Starts a new entry when forced, when the history is empty, or when
    /// there is no undo entry to extend; otherwise prepends the handle to the
    /// top undo entry.
    pub fn add(&mut self, handle: TxnHandle, force_new_entry: bool) -> TxnResult<()> {
        if !self.registry.contains(&handle) {
            return Err(TxnError::InvalidHandle);
        }

        let description = handle.to_string();

        if force_new_entry || self.undo_position >= self.entries.len() {
            self.clear_redo_entries();
            self.entries.push_front(HistoryEntry::new(handle));
            log_event(
                TxnEvent::HistoryAdd,
                &[("entry", "new"), ("txn", &description)],
            );
        } else {
            self.entries[self.undo_position].handles.push_front(handle);
            log_event(
                TxnEvent::HistoryAdd,
                &[("entry", "extend"), ("txn", &description)],
            );
        }
        Ok(())
    }

    /// Move the top undo entry to the redo side
    pub(crate) fn mark_undone(&mut self) -> bool {
        if self.undo_position < self.entries.len() {
            self.undo_position += 1;
            true
        } else {
            false
        }
    }

    /// Move the top redo entry back to the undo side
    pub(crate) fn mark_redone(&mut self) -> bool {
        if self.undo_position > 0 {
            self.undo_position -= 1;
            true
        } else {
            false
        }
    }

    /// Remove every undo entry; the undo position is unchanged
    pub fn clear_undo_entries(&mut self) {
        log_event(TxnEvent::HistoryClearUndo, &[]);
        self.entries.truncate(self.undo_position);
    }

    /// Remove every redo entry and reset the undo position
    pub fn clear_redo_entries(&mut self) {
        if self.undo_position > 0 {
            log_event(TxnEvent::HistoryClearRedo, &[]);
            self.entries.drain(..self.undo_position);
            self.undo_position = 0;
        }
    }

    /// Remove every entry
    pub fn clear_all_entries(&mut self) {
        log_event(TxnEvent::HistoryClearAll, &[]);
        self.entries.clear();
        self.undo_position = 0;
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

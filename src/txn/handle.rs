//! Opaque transaction handles
//!
//! A handle is the only thing callers ever hold for a registered work unit.
//! It can be submitted and printed; the unit's `execute`/`undo`/`redo` stay
//! reachable only through the owning manager's registry.

use std::fmt;
use std::sync::{Arc, Weak};

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use uuid::Uuid;

use super::errors::{TxnError, TxnResult};
use super::manager::{ManagerShared, TransactionManager};
use super::work_unit::WorkUnit;

/// Registry-local handle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub(crate) u64);

impl HandleId {
    /// Numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct HandleInner {
    id: HandleId,
    owner: Uuid,
    // Keeps the unit alive; the registry only holds a weak reference
    unit: Arc<dyn WorkUnit>,
    manager: Weak<ManagerShared>,
}

/// Opaque handle to a registered work unit
#[derive(Clone)]
pub struct TxnHandle {
    inner: Arc<HandleInner>,
}

impl TxnHandle {
    pub(crate) fn new(
        id: HandleId,
        owner: Uuid,
        unit: Arc<dyn WorkUnit>,
        manager: Weak<ManagerShared>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                owner,
                unit,
                manager,
            }),
        }
    }

    /// Identifier within the owning registry
    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    /// Identifier of the manager this handle was registered with
    pub fn owner(&self) -> Uuid {
        self.inner.owner
    }

    /// Execute the unit through its manager and record it in history.
    ///
    /// Same as `TransactionManager::transact(&handle)`.
    pub fn transact(&self) -> BoxFuture<'static, TxnResult<Value>> {
        match self.inner.manager.upgrade() {
            Some(shared) => TransactionManager::from_shared(shared).transact(self),
            None => future::ready(Err(TxnError::QueueClosed)).boxed(),
        }
    }
}

impl PartialEq for TxnHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.owner == other.inner.owner && self.inner.id == other.inner.id
    }
}

impl Eq for TxnHandle {}

impl fmt::Display for TxnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.unit.describe())
    }
}

impl fmt::Debug for TxnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxnHandle")
            .field("id", &self.inner.id)
            .field("unit", &self.inner.unit.describe())
            .finish()
    }
}

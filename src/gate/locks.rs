//! Per-session lock table.
//!
//! Each session gets its own async mutex, so requests from unrelated sessions never
//! contend. Entries are weak: once no request holds a session's lock the slot is dead and
//! is pruned on a later insert.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::Mutex as AsyncMutex;

use crate::session::SessionId;

const MIN_PRUNE_AT: usize = 64;

#[derive(Debug)]
struct Table {
    slots: HashMap<SessionId, Weak<AsyncMutex<()>>>,
    prune_at: usize,
}

#[derive(Debug)]
pub(crate) struct SessionLocks {
    table: Mutex<Table>,
}

impl Default for SessionLocks {
    fn default() -> Self {
        Self { table: Mutex::new(Table { slots: HashMap::new(), prune_at: MIN_PRUNE_AT }) }
    }
}

impl SessionLocks {
    /// Lock handle for `session`, creating it if no live handle exists.
    pub(crate) fn handle(&self, session: &SessionId) -> Arc<AsyncMutex<()>> {
        let mut table = self.table();
        if let Some(live) = table.slots.get(session).and_then(Weak::upgrade) {
            return live;
        }

        let lock = Arc::new(AsyncMutex::new(()));
        table.slots.insert(session.clone(), Arc::downgrade(&lock));
        if table.slots.len() >= table.prune_at {
            table.slots.retain(|_, slot| slot.strong_count() > 0);
            table.prune_at = (table.slots.len() * 2).max(MIN_PRUNE_AT);
        }
        lock
    }

    /// Drop the slot for a destroyed session.
    ///
    /// A slot still held by an in-flight request is kept: removing it would let the next
    /// `handle` mint a second mutex for the same session.
    pub(crate) fn forget(&self, session: &SessionId) {
        let mut table = self.table();
        if table.slots.get(session).map_or(false, |slot| slot.strong_count() == 0) {
            table.slots.remove(session);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.table().slots.len()
    }

    // The table only holds weak handles, so a poisoned guard is still consistent.
    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bourse_core::{OrderId, Ticker, UserId};
use bourse_ports::{StoreError, StoreResult};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Identity of a lockable row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum RowKey {
    User(UserId),
    Instrument(Ticker),
    Order(OrderId),
    Balance(UserId, Ticker),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::User(id) => write!(f, "user {id}"),
            RowKey::Instrument(ticker) => write!(f, "instrument {ticker}"),
            RowKey::Order(id) => write!(f, "order {id}"),
            RowKey::Balance(user, ticker) => write!(f, "balance {user}/{ticker}"),
        }
    }
}

/// Store-wide registry of row mutexes, created on first use and dropped
/// once nobody holds or waits for them.
pub(crate) struct LockTable {
    rows: DashMap<RowKey, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl LockTable {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            rows: DashMap::new(),
            timeout,
        }
    }

    fn handle(&self, key: &RowKey) -> Arc<Mutex<()>> {
        let entry = self
            .rows
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }

    fn release(&self, key: &RowKey) {
        // Only the map's own handle left: no holder, no waiter.
        self.rows.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Locks held by one transaction. Re-entrant; released on drop.
pub(crate) struct HeldLocks {
    table: Arc<LockTable>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
}

impl HeldLocks {
    pub(crate) fn new(table: Arc<LockTable>) -> Self {
        Self {
            table,
            held: HashMap::new(),
        }
    }

    pub(crate) fn holds(&self, key: &RowKey) -> bool {
        self.held.contains_key(key)
    }

    pub(crate) fn require(&self, key: &RowKey) -> StoreResult<()> {
        if self.holds(key) {
            Ok(())
        } else {
            Err(StoreError::RowNotLocked {
                row: key.to_string(),
            })
        }
    }

    /// Wait for the row lock, giving up after the table's timeout
    pub(crate) async fn acquire(&mut self, key: RowKey) -> StoreResult<()> {
        if self.holds(&key) {
            return Ok(());
        }

        let mutex = self.table.handle(&key);
        match tokio::time::timeout(self.table.timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                self.held.insert(key, guard);
                Ok(())
            }
            Err(_) => {
                self.table.release(&key);
                Err(StoreError::LockTimeout {
                    row: key.to_string(),
                })
            }
        }
    }
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        for (key, guard) in self.held.drain() {
            drop(guard);
            self.table.release(&key);
        }
    }
}

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bourse_core::{
    Balance, Instrument, Order, OrderId, Role, Ticker, Trade, User, UserId,
};
use bourse_ports::{
    InstrumentDirectory, Store, StoreError, StoreResult, Transaction, UserDirectory,
};
use log::debug;
use parking_lot::RwLock;

use super::locks::{HeldLocks, LockTable, RowKey};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2000);

/// Committed state
#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    instruments: BTreeMap<Ticker, Instrument>,
    orders: HashMap<OrderId, Order>,
    balances: HashMap<(UserId, Ticker), Balance>,
    /// Per ticker, in commit order
    trades: HashMap<Ticker, Vec<Trade>>,
}

struct Shared {
    tables: RwLock<Tables>,
    locks: Arc<LockTable>,
    sequence: AtomicU64,
}

/// In-memory transactional store
///
/// Row locks are tokio mutexes acquired under a timeout; a timeout stands
/// in for deadlock detection. Commits apply under one write lock, so
/// readers only ever observe whole units of work.
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                locks: Arc::new(LockTable::new(lock_timeout)),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Snapshot of every committed order
    pub fn orders(&self) -> Vec<Order> {
        self.shared.tables.read().orders.values().cloned().collect()
    }

    /// Snapshot of every committed balance row
    pub fn balances(&self) -> Vec<Balance> {
        self.shared.tables.read().balances.values().cloned().collect()
    }

    /// Sum of all committed balances in `ticker`
    pub fn total_supply(&self, ticker: &str) -> u128 {
        self.shared
            .tables
            .read()
            .balances
            .values()
            .filter(|b| b.ticker == ticker)
            .map(|b| u128::from(b.amount))
            .sum()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryStore {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> StoreResult<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            locks: HeldLocks::new(Arc::clone(&self.shared.locks)),
            pending: Pending::default(),
        })
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn exists(&self, user_id: UserId) -> bool {
        self.shared.tables.read().users.contains_key(&user_id)
    }

    async fn role(&self, user_id: UserId) -> Option<Role> {
        self.shared.tables.read().users.get(&user_id).map(|u| u.role)
    }
}

#[async_trait]
impl InstrumentDirectory for InMemoryStore {
    async fn exists(&self, ticker: &str) -> bool {
        self.shared.tables.read().instruments.contains_key(ticker)
    }

    async fn is_active(&self, ticker: &str) -> bool {
        self.shared
            .tables
            .read()
            .instruments
            .get(ticker)
            .is_some_and(|i| i.is_active)
    }
}

/// Writes buffered until commit. `None` marks a deletion.
#[derive(Default)]
struct Pending {
    users: HashMap<UserId, Option<User>>,
    instruments: HashMap<Ticker, Option<Instrument>>,
    orders: HashMap<OrderId, Order>,
    balances: HashMap<(UserId, Ticker), Option<Balance>>,
    trades: Vec<Trade>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.instruments.is_empty()
            && self.orders.is_empty()
            && self.balances.is_empty()
            && self.trades.is_empty()
    }
}

pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    locks: HeldLocks,
    pending: Pending,
}

impl InMemoryTransaction {
    fn read_user(&self, id: UserId) -> Option<User> {
        match self.pending.users.get(&id) {
            Some(row) => row.clone(),
            None => self.shared.tables.read().users.get(&id).cloned(),
        }
    }

    fn read_instrument(&self, ticker: &str) -> Option<Instrument> {
        match self.pending.instruments.get(ticker) {
            Some(row) => row.clone(),
            None => self.shared.tables.read().instruments.get(ticker).cloned(),
        }
    }

    fn read_order(&self, id: OrderId) -> Option<Order> {
        match self.pending.orders.get(&id) {
            Some(order) => Some(order.clone()),
            None => self.shared.tables.read().orders.get(&id).cloned(),
        }
    }

    fn read_balance(&self, user_id: UserId, ticker: &str) -> Option<Balance> {
        let key = (user_id, ticker.to_string());
        match self.pending.balances.get(&key) {
            Some(row) => row.clone(),
            None => self.shared.tables.read().balances.get(&key).cloned(),
        }
    }

    /// Committed orders matching `filter`, overlaid with pending ones
    fn scan_orders(&self, filter: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut merged: HashMap<OrderId, Order> = self
            .shared
            .tables
            .read()
            .orders
            .values()
            .filter(|o| filter(o))
            .map(|o| (o.id, o.clone()))
            .collect();

        for order in self.pending.orders.values() {
            if filter(order) {
                merged.insert(order.id, order.clone());
            } else {
                merged.remove(&order.id);
            }
        }

        merged.into_values().collect()
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read_user(id))
    }

    async fn lock_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        self.locks.acquire(RowKey::User(id)).await?;
        Ok(self.read_user(id))
    }

    async fn insert_user(&mut self, user: User) -> StoreResult<()> {
        let key = RowKey::User(user.id);
        self.locks.acquire(key.clone()).await?;
        if self.read_user(user.id).is_some() {
            return Err(StoreError::Conflict {
                row: key.to_string(),
            });
        }
        self.pending.users.insert(user.id, Some(user));
        Ok(())
    }

    async fn delete_user(&mut self, id: UserId) -> StoreResult<()> {
        self.locks.require(&RowKey::User(id))?;
        self.pending.users.insert(id, None);
        Ok(())
    }

    async fn instrument(&mut self, ticker: &str) -> StoreResult<Option<Instrument>> {
        Ok(self.read_instrument(ticker))
    }

    async fn lock_instrument(&mut self, ticker: &str) -> StoreResult<Option<Instrument>> {
        self.locks
            .acquire(RowKey::Instrument(ticker.to_string()))
            .await?;
        Ok(self.read_instrument(ticker))
    }

    async fn save_instrument(&mut self, instrument: Instrument) -> StoreResult<()> {
        self.locks
            .require(&RowKey::Instrument(instrument.ticker.clone()))?;
        self.pending
            .instruments
            .insert(instrument.ticker.clone(), Some(instrument));
        Ok(())
    }

    async fn delete_instrument(&mut self, ticker: &str) -> StoreResult<()> {
        self.locks.require(&RowKey::Instrument(ticker.to_string()))?;
        self.pending.instruments.insert(ticker.to_string(), None);
        Ok(())
    }

    async fn instruments(&mut self) -> StoreResult<Vec<Instrument>> {
        let mut merged = self.shared.tables.read().instruments.clone();
        for (ticker, row) in &self.pending.instruments {
            match row {
                Some(instrument) => {
                    merged.insert(ticker.clone(), instrument.clone());
                }
                None => {
                    merged.remove(ticker);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    async fn order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.read_order(id))
    }

    async fn lock_order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        self.locks.acquire(RowKey::Order(id)).await?;
        Ok(self.read_order(id))
    }

    async fn insert_order(&mut self, mut order: Order) -> StoreResult<Order> {
        let key = RowKey::Order(order.id);
        self.locks.acquire(key.clone()).await?;
        if self.read_order(order.id).is_some() {
            return Err(StoreError::Conflict {
                row: key.to_string(),
            });
        }

        order.sequence = self.shared.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn save_order(&mut self, order: Order) -> StoreResult<()> {
        self.locks.require(&RowKey::Order(order.id))?;
        self.pending.orders.insert(order.id, order);
        Ok(())
    }

    async fn orders_by_user(&mut self, user_id: UserId) -> StoreResult<Vec<Order>> {
        Ok(self.scan_orders(|o| o.user_id == user_id))
    }

    async fn open_orders(&mut self, ticker: &str) -> StoreResult<Vec<Order>> {
        Ok(self.scan_orders(|o| o.ticker == ticker && o.status.is_active()))
    }

    async fn balance(&mut self, user_id: UserId, ticker: &str) -> StoreResult<Option<Balance>> {
        Ok(self.read_balance(user_id, ticker))
    }

    async fn lock_balance(
        &mut self,
        user_id: UserId,
        ticker: &str,
    ) -> StoreResult<Option<Balance>> {
        self.locks
            .acquire(RowKey::Balance(user_id, ticker.to_string()))
            .await?;
        Ok(self.read_balance(user_id, ticker))
    }

    async fn save_balance(&mut self, balance: Balance) -> StoreResult<()> {
        let key = (balance.user_id, balance.ticker.clone());
        self.locks
            .require(&RowKey::Balance(key.0, key.1.clone()))?;
        self.pending.balances.insert(key, Some(balance));
        Ok(())
    }

    async fn balances_by_user(&mut self, user_id: UserId) -> StoreResult<Vec<Balance>> {
        let mut merged: BTreeMap<Ticker, Balance> = self
            .shared
            .tables
            .read()
            .balances
            .values()
            .filter(|b| b.user_id == user_id)
            .map(|b| (b.ticker.clone(), b.clone()))
            .collect();

        for ((owner, ticker), row) in &self.pending.balances {
            if *owner != user_id {
                continue;
            }
            match row {
                Some(balance) => {
                    merged.insert(ticker.clone(), balance.clone());
                }
                None => {
                    merged.remove(ticker);
                }
            }
        }

        Ok(merged.into_values().collect())
    }

    async fn delete_balance(&mut self, user_id: UserId, ticker: &str) -> StoreResult<()> {
        self.locks
            .require(&RowKey::Balance(user_id, ticker.to_string()))?;
        self.pending
            .balances
            .insert((user_id, ticker.to_string()), None);
        Ok(())
    }

    async fn append_trade(&mut self, trade: Trade) -> StoreResult<()> {
        self.pending.trades.push(trade);
        Ok(())
    }

    async fn trades(&mut self, ticker: &str, limit: usize) -> StoreResult<Vec<Trade>> {
        let mut recent: Vec<Trade> = self
            .pending
            .trades
            .iter()
            .rev()
            .filter(|t| t.ticker == ticker)
            .take(limit)
            .cloned()
            .collect();

        if recent.len() < limit {
            let tables = self.shared.tables.read();
            if let Some(committed) = tables.trades.get(ticker) {
                let wanted = limit - recent.len();
                recent.extend(committed.iter().rev().take(wanted).cloned());
            }
        }

        Ok(recent)
    }

    async fn commit(self) -> StoreResult<()> {
        let InMemoryTransaction {
            shared,
            locks,
            pending,
        } = self;

        if !pending.is_empty() {
            let mut tables = shared.tables.write();

            for (id, row) in pending.users {
                match row {
                    Some(user) => {
                        tables.users.insert(id, user);
                    }
                    None => {
                        tables.users.remove(&id);
                    }
                }
            }

            for (ticker, row) in pending.instruments {
                match row {
                    Some(instrument) => {
                        tables.instruments.insert(ticker, instrument);
                    }
                    None => {
                        tables.instruments.remove(&ticker);
                    }
                }
            }

            tables.orders.extend(pending.orders);

            for (key, row) in pending.balances {
                match row {
                    Some(balance) => {
                        tables.balances.insert(key, balance);
                    }
                    None => {
                        tables.balances.remove(&key);
                    }
                }
            }

            let trade_count = pending.trades.len();
            for trade in pending.trades {
                tables
                    .trades
                    .entry(trade.ticker.clone())
                    .or_default()
                    .push(trade);
            }

            debug!("Committed unit of work ({} trades)", trade_count);
        }

        // Locks go only after the writes are visible.
        drop(locks);
        Ok(())
    }
}

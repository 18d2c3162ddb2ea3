use async_trait::async_trait;
use bourse_core::{Balance, Instrument, Order, OrderId, Trade, User, UserId};

use crate::error::StoreResult;

/// Source of units of work
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: Transaction;

    async fn begin(&self) -> StoreResult<Self::Tx>;
}

/// One atomic, all-or-nothing sequence of reads and writes.
///
/// Reads see committed state overlaid with this transaction's own pending
/// writes. `lock_*` methods take an exclusive row lock that is held until
/// commit or drop and return the freshest value of the row. Order and
/// balance writes require the row lock. Dropping the handle without
/// calling [`Transaction::commit`] discards every pending write.
#[async_trait]
pub trait Transaction: Send {
    // Users

    async fn user(&mut self, id: UserId) -> StoreResult<Option<User>>;

    async fn lock_user(&mut self, id: UserId) -> StoreResult<Option<User>>;

    /// Fails with `Conflict` when the id is taken
    async fn insert_user(&mut self, user: User) -> StoreResult<()>;

    /// Requires the user lock
    async fn delete_user(&mut self, id: UserId) -> StoreResult<()>;

    // Instruments

    async fn instrument(&mut self, ticker: &str) -> StoreResult<Option<Instrument>>;

    async fn lock_instrument(&mut self, ticker: &str) -> StoreResult<Option<Instrument>>;

    /// Insert or replace; requires the instrument lock
    async fn save_instrument(&mut self, instrument: Instrument) -> StoreResult<()>;

    /// Requires the instrument lock
    async fn delete_instrument(&mut self, ticker: &str) -> StoreResult<()>;

    async fn instruments(&mut self) -> StoreResult<Vec<Instrument>>;

    // Orders

    async fn order(&mut self, id: OrderId) -> StoreResult<Option<Order>>;

    async fn lock_order(&mut self, id: OrderId) -> StoreResult<Option<Order>>;

    /// Stores a new order, assigns its sequence number and takes its lock
    async fn insert_order(&mut self, order: Order) -> StoreResult<Order>;

    /// Replace an existing order; requires the order lock
    async fn save_order(&mut self, order: Order) -> StoreResult<()>;

    async fn orders_by_user(&mut self, user_id: UserId) -> StoreResult<Vec<Order>>;

    /// Non-terminal orders of any type for a ticker, unordered and unlocked
    async fn open_orders(&mut self, ticker: &str) -> StoreResult<Vec<Order>>;

    // Balances

    async fn balance(&mut self, user_id: UserId, ticker: &str) -> StoreResult<Option<Balance>>;

    async fn lock_balance(&mut self, user_id: UserId, ticker: &str)
    -> StoreResult<Option<Balance>>;

    /// Insert or replace; requires the balance lock
    async fn save_balance(&mut self, balance: Balance) -> StoreResult<()>;

    async fn balances_by_user(&mut self, user_id: UserId) -> StoreResult<Vec<Balance>>;

    /// Requires the lock of every balance being removed
    async fn delete_balance(&mut self, user_id: UserId, ticker: &str) -> StoreResult<()>;

    // Trades

    async fn append_trade(&mut self, trade: Trade) -> StoreResult<()>;

    /// Most recent first, at most `limit`
    async fn trades(&mut self, ticker: &str, limit: usize) -> StoreResult<Vec<Trade>>;

    /// Apply every pending write atomically and release all locks
    async fn commit(self) -> StoreResult<()>;
}

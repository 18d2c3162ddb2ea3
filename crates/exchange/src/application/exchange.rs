use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use bourse_core::{
    Amount, Order, OrderBookSnapshot, OrderId, OrderRequest, Side, Ticker, Trade, UserId,
    aggregate_levels,
};
use bourse_ports::{Clock, EventNotifier, InstrumentDirectory, Store, UserDirectory};
use log::warn;

use super::{Ledger, MatchingEngine, OrderStore, SubmitOutcome, TradeLog};
use crate::error::{ExchangeError, Result};

/// Caps on read queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeLimits {
    pub max_book_depth: usize,
    pub max_trade_history: usize,
}

impl Default for ExchangeLimits {
    fn default() -> Self {
        Self {
            max_book_depth: 25,
            max_trade_history: 100,
        }
    }
}

/// Service boundary of the exchange
///
/// Wraps the matching engine with the read queries, the admin operations
/// and a single retry of units of work aborted by lock contention.
pub struct Exchange<C, S, U, I, N>
where
    C: Clock,
    S: Store,
    U: UserDirectory,
    I: InstrumentDirectory,
    N: EventNotifier,
{
    pub(super) engine: MatchingEngine<C, S, U, I, N>,
    pub(super) clock: Arc<C>,
    pub(super) store: Arc<S>,
    pub(super) users: Arc<U>,
    pub(super) instruments: Arc<I>,
    pub(super) notifier: Arc<N>,
    pub(super) limits: ExchangeLimits,
    pub(super) ledger: Ledger,
    pub(super) orders: OrderStore,
    pub(super) trades: TradeLog,
}

impl<C, S, U, I, N> Exchange<C, S, U, I, N>
where
    C: Clock,
    S: Store,
    U: UserDirectory,
    I: InstrumentDirectory,
    N: EventNotifier,
{
    pub fn new(
        clock: Arc<C>,
        store: Arc<S>,
        users: Arc<U>,
        instruments: Arc<I>,
        notifier: Arc<N>,
        limits: ExchangeLimits,
    ) -> Self {
        let engine = MatchingEngine::new(
            Arc::clone(&clock),
            Arc::clone(&store),
            Arc::clone(&users),
            Arc::clone(&instruments),
            Arc::clone(&notifier),
        );

        Self {
            engine,
            clock,
            store,
            users,
            instruments,
            notifier,
            limits,
            ledger: Ledger::new(),
            orders: OrderStore::new(),
            trades: TradeLog::new(),
        }
    }

    pub fn limits(&self) -> ExchangeLimits {
        self.limits
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Submit an order and match it immediately
    pub async fn submit_order(
        &self,
        user_id: UserId,
        request: OrderRequest,
    ) -> Result<SubmitOutcome> {
        self.retry_once("submission", || self.engine.submit(user_id, request.clone()))
            .await
    }

    pub async fn cancel_order(&self, order_id: OrderId, requesting_user: UserId) -> Result<Order> {
        self.retry_once("cancellation", || {
            self.engine.cancel(order_id, requesting_user)
        })
        .await
    }

    /// Look up an order owned by `requesting_user`
    pub async fn get_order(&self, order_id: OrderId, requesting_user: UserId) -> Result<Order> {
        let order = self.order(order_id).await?;
        if order.user_id != requesting_user {
            return Err(ExchangeError::NotFound(format!("order {order_id}")));
        }
        Ok(order)
    }

    /// Look up any order
    pub async fn order(&self, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        Ok(self.orders.get(&mut tx, order_id).await?)
    }

    /// A user's orders, oldest first
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        self.ensure_user(user_id).await?;
        let mut tx = self.store.begin().await?;
        Ok(self.orders.list_by_user(&mut tx, user_id).await?)
    }

    /// Aggregated remaining quantity per price level, best prices first
    pub async fn get_orderbook(&self, ticker: &str, depth: usize) -> Result<OrderBookSnapshot> {
        if depth > self.limits.max_book_depth {
            return Err(ExchangeError::InvalidInput(format!(
                "depth {} exceeds maximum {}",
                depth, self.limits.max_book_depth
            )));
        }
        self.ensure_instrument(ticker).await?;

        let mut tx = self.store.begin().await?;
        let bids = self
            .orders
            .resting_orders(&mut tx, ticker, Side::Buy, None)
            .await?;
        let asks = self
            .orders
            .resting_orders(&mut tx, ticker, Side::Sell, None)
            .await?;

        Ok(OrderBookSnapshot {
            ticker: ticker.to_string(),
            bids: aggregate_levels(&bids, depth),
            asks: aggregate_levels(&asks, depth),
        })
    }

    /// Most recent trades first
    pub async fn get_trade_history(&self, ticker: &str, limit: usize) -> Result<Vec<Trade>> {
        if limit > self.limits.max_trade_history {
            return Err(ExchangeError::InvalidInput(format!(
                "limit {} exceeds maximum {}",
                limit, self.limits.max_trade_history
            )));
        }
        self.ensure_instrument(ticker).await?;

        let mut tx = self.store.begin().await?;
        Ok(self.trades.history(&mut tx, ticker, limit).await?)
    }

    pub async fn get_balances(&self, user_id: UserId) -> Result<BTreeMap<Ticker, Amount>> {
        self.ensure_user(user_id).await?;
        let mut tx = self.store.begin().await?;
        Ok(self.ledger.balances(&mut tx, user_id).await?)
    }

    pub async fn get_balance(&self, user_id: UserId, ticker: &str) -> Result<Amount> {
        self.ensure_user(user_id).await?;
        let mut tx = self.store.begin().await?;
        Ok(self.ledger.get_balance(&mut tx, user_id, ticker).await?)
    }

    pub(super) async fn ensure_user(&self, user_id: UserId) -> Result<()> {
        if self.users.exists(user_id).await {
            Ok(())
        } else {
            Err(ExchangeError::NotFound(format!("user {user_id}")))
        }
    }

    pub(super) async fn ensure_instrument(&self, ticker: &str) -> Result<()> {
        if self.instruments.exists(ticker).await {
            Ok(())
        } else {
            Err(ExchangeError::NotFound(format!("instrument {ticker}")))
        }
    }

    /// Run `attempt`, and once more if the first run was aborted by lock
    /// contention. A second abort surfaces as a plain internal error.
    pub(super) async fn retry_once<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match attempt().await {
            Err(e) if e.is_retryable() => {
                warn!("{} aborted ({}), retrying once", operation, e);
                attempt().await.map_err(|e| match e {
                    ExchangeError::Internal {
                        message,
                        retryable: true,
                    } => ExchangeError::internal(message),
                    other => other,
                })
            }
            other => other,
        }
    }
}

use std::sync::Arc;

use bourse_core::{
    Amount, Counterparties, ExchangeEvent, Order, OrderId, OrderKind, OrderRequest, OrderStatus,
    Price, Quantity, SETTLEMENT_TICKER, Side, Timestamp, Trade, UserId, notional,
};
use bourse_ports::{Clock, EventNotifier, InstrumentDirectory, Store, Transaction, UserDirectory};
use log::{debug, error, info, warn};

use super::{Ledger, OrderStore, TradeLog};
use crate::error::{ExchangeError, Result};

/// Result of a committed submission
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// The incoming order as committed
    pub order: Order,
    /// Trades in execution order
    pub trades: Vec<Trade>,
}

/// Price-time matching of incoming orders against resting ones
///
/// Each submission and each cancellation is one unit of work. Events are
/// collected while the unit of work runs and only published after it
/// commits.
pub struct MatchingEngine<C, S, U, I, N>
where
    C: Clock,
    S: Store,
    U: UserDirectory,
    I: InstrumentDirectory,
    N: EventNotifier,
{
    clock: Arc<C>,
    store: Arc<S>,
    users: Arc<U>,
    instruments: Arc<I>,
    notifier: Arc<N>,
    ledger: Ledger,
    orders: OrderStore,
    trades: TradeLog,
}

impl<C, S, U, I, N> MatchingEngine<C, S, U, I, N>
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
    ) -> Self {
        Self {
            clock,
            store,
            users,
            instruments,
            notifier,
            ledger: Ledger::new(),
            orders: OrderStore::new(),
            trades: TradeLog::new(),
        }
    }

    /// Validate, pre-check and match one order.
    ///
    /// Rejections leave no trace: the order is only stored if the
    /// submitter could cover it in the worst case.
    pub async fn submit(&self, user_id: UserId, request: OrderRequest) -> Result<SubmitOutcome> {
        self.validate(user_id, &request).await?;

        let mut tx = self.store.begin().await?;
        let mut events = Vec::new();

        let outcome = match self.execute(&mut tx, user_id, request, &mut events).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log_rejection("submission", user_id, &e);
                return Err(e);
            }
        };

        tx.commit().await?;

        info!(
            "Order {} from {} {} {} {}: {} ({}/{} filled, {} trades)",
            outcome.order.id,
            user_id,
            outcome.order.side,
            outcome.order.order_type(),
            outcome.order.ticker,
            outcome.order.status,
            outcome.order.filled,
            outcome.order.quantity,
            outcome.trades.len()
        );

        self.publish(events).await;
        Ok(outcome)
    }

    /// Cancel an order on behalf of its owner. Orders of other users are
    /// reported as missing.
    pub async fn cancel(&self, order_id: OrderId, requesting_user: UserId) -> Result<Order> {
        let mut tx = self.store.begin().await?;

        let order = self.orders.lock(&mut tx, order_id).await?;
        if order.user_id != requesting_user {
            return Err(ExchangeError::NotFound(format!("order {order_id}")));
        }

        let cancelled = match self.orders.cancel(&mut tx, order_id, self.clock.now()).await {
            Ok(order) => order,
            Err(e) => {
                let e = ExchangeError::from(e);
                log_rejection("cancellation", requesting_user, &e);
                return Err(e);
            }
        };

        tx.commit().await?;
        info!("Order {} cancelled by {}", order_id, requesting_user);

        self.publish(vec![ExchangeEvent::OrderStatusChanged((&cancelled).into())])
            .await;
        Ok(cancelled)
    }

    /// Publish after commit. Failures are logged and dropped.
    pub async fn publish(&self, events: Vec<ExchangeEvent>) {
        for event in events {
            if let Err(e) = self.notifier.publish(event).await {
                warn!("Dropped exchange event: {}", e);
            }
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Stateless checks against the directories
    async fn validate(&self, user_id: UserId, request: &OrderRequest) -> Result<()> {
        request
            .validate()
            .map_err(|reason| ExchangeError::InvalidInput(reason.to_string()))?;

        if request.ticker == SETTLEMENT_TICKER {
            return Err(ExchangeError::InvalidInput(format!(
                "{SETTLEMENT_TICKER} is the settlement currency and cannot be traded"
            )));
        }

        if !self.users.exists(user_id).await {
            return Err(ExchangeError::NotFound(format!("user {user_id}")));
        }

        if !self.instruments.exists(&request.ticker).await {
            return Err(ExchangeError::NotFound(format!(
                "instrument {}",
                request.ticker
            )));
        }

        if !self.instruments.is_active(&request.ticker).await {
            return Err(ExchangeError::InvalidInput(format!(
                "instrument {} is not active",
                request.ticker
            )));
        }

        signed(request.quantity)?;
        if let OrderKind::Limit { price } = request.kind {
            let cost = notional(request.quantity, price).ok_or_else(too_large)?;
            signed(cost)?;
        }

        Ok(())
    }

    async fn execute<T: Transaction>(
        &self,
        tx: &mut T,
        user_id: UserId,
        request: OrderRequest,
        events: &mut Vec<ExchangeEvent>,
    ) -> Result<SubmitOutcome> {
        // One matcher per ticker at a time: commits on a ticker are totally
        // ordered and two crossing orders cannot both come to rest.
        let instrument = tx
            .lock_instrument(&request.ticker)
            .await?
            .ok_or_else(|| ExchangeError::NotFound(format!("instrument {}", request.ticker)))?;
        if !instrument.is_active {
            return Err(ExchangeError::InvalidInput(format!(
                "instrument {} is not active",
                instrument.ticker
            )));
        }

        // Serializes with account deletion
        if tx.lock_user(user_id).await?.is_none() {
            return Err(ExchangeError::NotFound(format!("user {user_id}")));
        }

        self.pre_check(tx, user_id, &request).await?;

        let order = Order::new_with_time(user_id, request, self.clock.now());
        let mut incoming = self.orders.insert(tx, order).await?;
        events.push(ExchangeEvent::OrderPlaced((&incoming).into()));
        debug!(
            "Accepted order {} (seq {}) for matching",
            incoming.id, incoming.sequence
        );

        let candidates = self
            .orders
            .resting_orders(tx, &incoming.ticker, incoming.side.opposite(), None)
            .await?;

        let mut trades = Vec::new();

        for candidate in candidates {
            if incoming.remaining() == 0 {
                break;
            }

            let Some(maker_price) = candidate.price() else {
                continue;
            };
            // Candidates are sorted best price first
            if !incoming.accepts_price(maker_price) {
                break;
            }

            let maker = self.orders.lock(tx, candidate.id).await?;
            if !maker.is_resting() || maker.remaining() == 0 {
                debug!("Order {} no longer resting, skipped", maker.id);
                continue;
            }

            let quantity = incoming.remaining().min(maker.remaining());
            let Some(trade) = self
                .settle(tx, &incoming, &maker, maker_price, quantity)
                .await?
            else {
                continue;
            };

            let maker = self.fill(tx, &maker, quantity, trade.created_at).await?;
            incoming = self.fill(tx, &incoming, quantity, trade.created_at).await?;

            events.push(ExchangeEvent::TradeExecuted((&trade).into()));
            events.push(ExchangeEvent::OrderStatusChanged((&maker).into()));
            events.push(ExchangeEvent::OrderStatusChanged((&incoming).into()));
            trades.push(trade);
        }

        if matches!(incoming.kind, OrderKind::Market) && incoming.remaining() > 0 {
            debug!(
                "Market order {} left {} unfilled; remainder dropped",
                incoming.id,
                incoming.remaining()
            );
        }

        Ok(SubmitOutcome {
            order: incoming,
            trades,
        })
    }

    /// Worst-case cover check, before anything is written
    async fn pre_check<T: Transaction>(
        &self,
        tx: &mut T,
        user_id: UserId,
        request: &OrderRequest,
    ) -> Result<()> {
        let (ticker, required) = match (request.side, request.kind) {
            (Side::Sell, _) => (request.ticker.as_str(), request.quantity),
            (Side::Buy, OrderKind::Limit { price }) => (
                SETTLEMENT_TICKER,
                notional(request.quantity, price).ok_or_else(too_large)?,
            ),
            (Side::Buy, OrderKind::Market) => {
                let best_ask = self
                    .orders
                    .resting_orders(tx, &request.ticker, Side::Sell, Some(1))
                    .await?
                    .first()
                    .and_then(Order::price)
                    .ok_or_else(|| ExchangeError::NoLiquidity(request.ticker.clone()))?;
                (
                    SETTLEMENT_TICKER,
                    notional(request.quantity, best_ask).ok_or_else(too_large)?,
                )
            }
        };

        let available = self.ledger.get_balance(tx, user_id, ticker).await?;
        if available < required {
            return Err(ExchangeError::InsufficientFunds {
                user_id,
                ticker: ticker.to_string(),
                required,
                available,
            });
        }

        Ok(())
    }

    /// Move money and asset for one match. `None` means the candidate is
    /// unmatchable right now and nothing was written.
    async fn settle<T: Transaction>(
        &self,
        tx: &mut T,
        incoming: &Order,
        maker: &Order,
        price: Price,
        quantity: Quantity,
    ) -> Result<Option<Trade>> {
        let (buy, sell) = match incoming.side {
            Side::Buy => (incoming, maker),
            Side::Sell => (maker, incoming),
        };
        let ticker = incoming.ticker.as_str();

        let Some(cost) = notional(quantity, price).and_then(|c| i64::try_from(c).ok()) else {
            warn!(
                "Skipping order {}: {} x {} overflows settlement",
                maker.id, quantity, price
            );
            return Ok(None);
        };
        let units = signed(quantity)?;

        // Fixed acquisition order keeps two matchers from waiting on each other
        let mut rows = vec![
            (buy.user_id, SETTLEMENT_TICKER),
            (buy.user_id, ticker),
            (sell.user_id, SETTLEMENT_TICKER),
            (sell.user_id, ticker),
        ];
        rows.sort();
        rows.dedup();
        for (user, row_ticker) in &rows {
            self.ledger.lock_balance(tx, *user, row_ticker).await?;
        }

        let buyer_cash = self
            .ledger
            .get_balance(tx, buy.user_id, SETTLEMENT_TICKER)
            .await?;
        if buyer_cash < cost.unsigned_abs() {
            warn!(
                "Skipping order {}: buyer {} has {} {}, needs {}",
                maker.id, buy.user_id, buyer_cash, SETTLEMENT_TICKER, cost
            );
            return Ok(None);
        }

        let seller_asset = self.ledger.get_balance(tx, sell.user_id, ticker).await?;
        if seller_asset < quantity {
            warn!(
                "Skipping order {}: seller {} has {} {}, needs {}",
                maker.id, sell.user_id, seller_asset, ticker, quantity
            );
            return Ok(None);
        }

        self.ledger
            .adjust(tx, buy.user_id, SETTLEMENT_TICKER, -cost)
            .await?;
        self.ledger.adjust(tx, sell.user_id, ticker, -units).await?;
        self.ledger.adjust(tx, buy.user_id, ticker, units).await?;
        self.ledger
            .adjust(tx, sell.user_id, SETTLEMENT_TICKER, cost)
            .await?;

        let parties = Counterparties {
            buyer_id: buy.user_id,
            seller_id: sell.user_id,
            buy_order_id: buy.id,
            sell_order_id: sell.id,
        };
        let trade =
            Trade::new_with_time(ticker, parties, price, quantity, incoming.side, self.clock.now());
        self.trades.record(tx, trade.clone()).await?;

        info!(
            "Trade {} {}: {} @ {} (buyer {}, seller {})",
            trade.id, ticker, quantity, price, buy.user_id, sell.user_id
        );
        Ok(Some(trade))
    }

    async fn fill<T: Transaction>(
        &self,
        tx: &mut T,
        order: &Order,
        quantity: Quantity,
        now: Timestamp,
    ) -> Result<Order> {
        let filled = order.filled + quantity;
        let status = OrderStatus::for_fill(filled, order.quantity);
        Ok(self
            .orders
            .update_fill(tx, order.id, filled, status, now)
            .await?)
    }
}

fn signed(amount: Amount) -> Result<i64> {
    i64::try_from(amount).map_err(|_| too_large())
}

fn too_large() -> ExchangeError {
    ExchangeError::InvalidInput("amount exceeds the supported range".to_string())
}

fn log_rejection(operation: &str, user_id: UserId, err: &ExchangeError) {
    match err {
        ExchangeError::Internal { .. } => {
            error!("Rolled back {} for {}: {}", operation, user_id, err)
        }
        _ => info!("Rejected {} for {}: {}", operation, user_id, err),
    }
}

use bourse_core::{
    Order, OrderId, OrderStatus, OrderType, Quantity, Side, Timestamp, UserId,
    price_time_priority,
};
use bourse_ports::Transaction;

use crate::error::OrderStoreError;

/// Order records and their lifecycle
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderStore;

impl OrderStore {
    pub fn new() -> Self {
        Self
    }

    /// Store a fresh order as NEW with nothing filled. The order stays
    /// locked by `tx` until the unit of work ends.
    pub async fn insert<T: Transaction>(
        &self,
        tx: &mut T,
        mut order: Order,
    ) -> Result<Order, OrderStoreError> {
        order.filled = 0;
        order.status = OrderStatus::New;
        Ok(tx.insert_order(order).await?)
    }

    pub async fn get<T: Transaction>(
        &self,
        tx: &mut T,
        order_id: OrderId,
    ) -> Result<Order, OrderStoreError> {
        tx.order(order_id)
            .await?
            .ok_or(OrderStoreError::NotFound(order_id))
    }

    /// Lock the row and return its freshest state
    pub async fn lock<T: Transaction>(
        &self,
        tx: &mut T,
        order_id: OrderId,
    ) -> Result<Order, OrderStoreError> {
        tx.lock_order(order_id)
            .await?
            .ok_or(OrderStoreError::NotFound(order_id))
    }

    /// A user's orders, oldest first
    pub async fn list_by_user<T: Transaction>(
        &self,
        tx: &mut T,
        user_id: UserId,
    ) -> Result<Vec<Order>, OrderStoreError> {
        let mut orders = tx.orders_by_user(user_id).await?;
        orders.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        Ok(orders)
    }

    /// Active LIMIT orders for one side of a ticker in price-time priority.
    ///
    /// The rows are not locked; callers that intend to fill one must go
    /// through [`OrderStore::lock`] and re-check it.
    pub async fn resting_orders<T: Transaction>(
        &self,
        tx: &mut T,
        ticker: &str,
        side: Side,
        limit: Option<usize>,
    ) -> Result<Vec<Order>, OrderStoreError> {
        let mut orders: Vec<Order> = tx
            .open_orders(ticker)
            .await?
            .into_iter()
            .filter(|o| o.side == side && o.is_resting())
            .collect();
        orders.sort_by(price_time_priority);

        if let Some(limit) = limit {
            orders.truncate(limit);
        }
        Ok(orders)
    }

    /// Whether any LIMIT order on `ticker` is still active
    pub async fn has_resting_orders<T: Transaction>(
        &self,
        tx: &mut T,
        ticker: &str,
    ) -> Result<bool, OrderStoreError> {
        Ok(tx
            .open_orders(ticker)
            .await?
            .iter()
            .any(|o| o.order_type() == OrderType::Limit))
    }

    pub async fn update_fill<T: Transaction>(
        &self,
        tx: &mut T,
        order_id: OrderId,
        new_filled: Quantity,
        new_status: OrderStatus,
        now: Timestamp,
    ) -> Result<Order, OrderStoreError> {
        let mut order = self.lock(tx, order_id).await?;
        order
            .set_fill(new_filled, new_status, now)
            .map_err(OrderStoreError::InvalidTransition)?;
        tx.save_order(order.clone()).await?;
        Ok(order)
    }

    pub async fn cancel<T: Transaction>(
        &self,
        tx: &mut T,
        order_id: OrderId,
        now: Timestamp,
    ) -> Result<Order, OrderStoreError> {
        let mut order = self.lock(tx, order_id).await?;
        order
            .cancel(now)
            .map_err(OrderStoreError::InvalidCancellation)?;
        tx.save_order(order.clone()).await?;
        Ok(order)
    }
}

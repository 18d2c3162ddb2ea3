use serde::{Deserialize, Serialize};

use crate::entities::{Order, OrderId, OrderStatus, OrderType, Side, Trade, TradeId, UserId};
use crate::values::{Price, Quantity, Ticker, Timestamp};

/// Domain events emitted by the exchange after a unit of work commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "camelCase")]
pub enum ExchangeEvent {
    /// Order was accepted and stored
    OrderPlaced(OrderPlacedEvent),
    /// Order fill level or status moved
    OrderStatusChanged(OrderStatusChangedEvent),
    /// Trade occurred
    TradeExecuted(TradeExecutedEvent),
}

impl ExchangeEvent {
    pub fn ticker(&self) -> &str {
        match self {
            ExchangeEvent::OrderPlaced(e) => &e.ticker,
            ExchangeEvent::OrderStatusChanged(e) => &e.ticker,
            ExchangeEvent::TradeExecuted(e) => &e.ticker,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub ticker: Ticker,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub ticker: Ticker,
    pub status: OrderStatus,
    pub filled: Quantity,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeExecutedEvent {
    pub trade_id: TradeId,
    pub ticker: Ticker,
    pub price: Price,
    pub quantity: Quantity,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub timestamp: Timestamp,
}

impl From<&Order> for OrderPlacedEvent {
    fn from(order: &Order) -> Self {
        OrderPlacedEvent {
            order_id: order.id,
            user_id: order.user_id,
            ticker: order.ticker.clone(),
            side: order.side,
            order_type: order.order_type(),
            price: order.price(),
            quantity: order.quantity,
            timestamp: order.created_at,
        }
    }
}

impl From<&Order> for OrderStatusChangedEvent {
    fn from(order: &Order) -> Self {
        OrderStatusChangedEvent {
            order_id: order.id,
            user_id: order.user_id,
            ticker: order.ticker.clone(),
            status: order.status,
            filled: order.filled,
            timestamp: order.updated_at,
        }
    }
}

impl From<&Trade> for TradeExecutedEvent {
    fn from(trade: &Trade) -> Self {
        TradeExecutedEvent {
            trade_id: trade.id,
            ticker: trade.ticker.clone(),
            price: trade.price,
            quantity: trade.quantity,
            buyer_id: trade.buyer_id,
            seller_id: trade.seller_id,
            timestamp: trade.created_at,
        }
    }
}

use std::cmp::Ordering;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{OrderKind, OrderStatus, OrderType, Side, UserId};
use crate::values::{Price, Quantity, Ticker, Timestamp};

/// Unique identifier for an order
pub type OrderId = Uuid;

/// What a user asks the exchange to do, before it becomes an [`Order`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub ticker: Ticker,
    pub side: Side,
    pub quantity: Quantity,
    #[serde(flatten)]
    pub kind: OrderKind,
}

impl OrderRequest {
    pub fn limit(ticker: impl Into<Ticker>, side: Side, quantity: Quantity, price: Price) -> Self {
        Self {
            ticker: ticker.into(),
            side,
            quantity,
            kind: OrderKind::Limit { price },
        }
    }

    pub fn market(ticker: impl Into<Ticker>, side: Side, quantity: Quantity) -> Self {
        Self {
            ticker: ticker.into(),
            side,
            quantity,
            kind: OrderKind::Market,
        }
    }

    /// Shape checks that need no state
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.ticker.trim().is_empty() {
            return Err("Ticker must not be empty");
        }

        if self.quantity == 0 {
            return Err("Quantity must be greater than zero");
        }

        if let OrderKind::Limit { price: 0 } = self.kind {
            return Err("Limit price must be greater than zero");
        }

        Ok(())
    }
}

/// Rejected order state change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Order {id} is already {status}")]
    Terminal { id: OrderId, status: OrderStatus },

    #[error("Fill of {requested} exceeds remaining {remaining} on order {id}")]
    Overfill {
        id: OrderId,
        requested: Quantity,
        remaining: Quantity,
    },

    #[error("Fill on order {id} cannot go from {current} back to {requested}")]
    FillRegression {
        id: OrderId,
        current: Quantity,
        requested: Quantity,
    },

    #[error("Status {status} does not match fill {filled}/{quantity} on order {id}")]
    StatusMismatch {
        id: OrderId,
        status: OrderStatus,
        filled: Quantity,
        quantity: Quantity,
    },

    #[error("Market order {id} has started filling and cannot be cancelled")]
    MarketInFlight { id: OrderId },
}

/// Full order details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub ticker: Ticker,
    pub side: Side,
    #[serde(flatten)]
    pub kind: OrderKind,
    pub quantity: Quantity,
    pub filled: Quantity,
    pub status: OrderStatus,
    /// Store-assigned insertion sequence, last tie-breaker after `created_at`
    pub sequence: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    /// Create a new order with explicit timestamp
    pub fn new_with_time(user_id: UserId, request: OrderRequest, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            ticker: request.ticker,
            side: request.side,
            kind: request.kind,
            quantity: request.quantity,
            filled: 0,
            status: OrderStatus::New,
            sequence: 0,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Create a new order using current system time
    /// Note: prefer `new_with_time` with clock-provided time
    pub fn new(user_id: UserId, request: OrderRequest) -> Self {
        Self::new_with_time(user_id, request, Utc::now())
    }

    pub fn price(&self) -> Option<Price> {
        self.kind.price()
    }

    pub fn order_type(&self) -> OrderType {
        self.kind.order_type()
    }

    /// Returns remaining quantity to be filled
    pub fn remaining(&self) -> Quantity {
        self.quantity.saturating_sub(self.filled)
    }

    /// Active limit orders are the only ones that sit in the book
    pub fn is_resting(&self) -> bool {
        self.order_type() == OrderType::Limit && self.status.is_active()
    }

    /// Whether this order, as aggressor, accepts a trade at `counter_price`
    pub fn accepts_price(&self, counter_price: Price) -> bool {
        match (self.side, self.price()) {
            (_, None) => true,
            (Side::Buy, Some(limit)) => counter_price <= limit,
            (Side::Sell, Some(limit)) => counter_price >= limit,
        }
    }

    /// Overwrite fill level and status, both of which must stay consistent
    pub fn set_fill(
        &mut self,
        filled: Quantity,
        status: OrderStatus,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        self.ensure_open()?;

        if filled > self.quantity {
            return Err(TransitionError::Overfill {
                id: self.id,
                requested: filled - self.filled,
                remaining: self.remaining(),
            });
        }

        if filled < self.filled {
            return Err(TransitionError::FillRegression {
                id: self.id,
                current: self.filled,
                requested: filled,
            });
        }

        if status != OrderStatus::for_fill(filled, self.quantity) {
            return Err(TransitionError::StatusMismatch {
                id: self.id,
                status,
                filled,
                quantity: self.quantity,
            });
        }

        self.filled = filled;
        self.status = status;
        self.updated_at = now;
        Ok(())
    }

    /// Withdraw the order from future matching
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), TransitionError> {
        self.ensure_open()?;

        if self.order_type() == OrderType::Market && self.filled > 0 {
            return Err(TransitionError::MarketInFlight { id: self.id });
        }

        self.status = OrderStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Price-time priority among resting orders of the same side.
///
/// Bids rank by price descending, asks by price ascending; equal prices
/// fall back to `created_at` then to the insertion sequence.
pub fn price_time_priority(a: &Order, b: &Order) -> Ordering {
    let by_price = match (a.price(), b.price()) {
        (Some(pa), Some(pb)) => match a.side {
            Side::Buy => pb.cmp(&pa),
            Side::Sell => pa.cmp(&pb),
        },
        _ => Ordering::Equal,
    };

    by_price
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.sequence.cmp(&b.sequence))
}

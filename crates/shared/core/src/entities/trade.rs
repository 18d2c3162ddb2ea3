use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderId, Side, UserId};
use crate::values::{Amount, Price, Quantity, Ticker, Timestamp, notional};

/// Unique identifier for a trade
pub type TradeId = Uuid;

/// Trade resulting from matching orders.
///
/// Executes at the resting order's price; `taker_side` records which side
/// crossed the spread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub ticker: Ticker,
    pub price: Price,
    pub quantity: Quantity,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub taker_side: Side,
    pub created_at: Timestamp,
}

/// The two orders a trade is struck between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counterparties {
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
}

impl Trade {
    /// Create a new trade with explicit timestamp
    pub fn new_with_time(
        ticker: impl Into<Ticker>,
        parties: Counterparties,
        price: Price,
        quantity: Quantity,
        taker_side: Side,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticker: ticker.into(),
            price,
            quantity,
            buyer_id: parties.buyer_id,
            seller_id: parties.seller_id,
            buy_order_id: parties.buy_order_id,
            sell_order_id: parties.sell_order_id,
            taker_side,
            created_at: timestamp,
        }
    }

    /// Create a new trade using current system time
    pub fn new(
        ticker: impl Into<Ticker>,
        parties: Counterparties,
        price: Price,
        quantity: Quantity,
        taker_side: Side,
    ) -> Self {
        Self::new_with_time(ticker, parties, price, quantity, taker_side, Utc::now())
    }

    /// Settlement-currency value of the trade
    pub fn notional(&self) -> Option<Amount> {
        notional(self.quantity, self.price)
    }
}

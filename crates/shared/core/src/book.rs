//! Aggregated order book views

use serde::{Deserialize, Serialize};

use crate::entities::Order;
use crate::values::{Price, Quantity, Ticker};

/// Total remaining quantity resting at one price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub quantity: Quantity,
}

impl PriceLevel {
    pub fn new(price: Price, quantity: Quantity) -> Self {
        Self { price, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub ticker: Ticker,
    /// Best (highest) bid first
    pub bids: Vec<PriceLevel>,
    /// Best (lowest) ask first
    pub asks: Vec<PriceLevel>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }
}

/// Fold resting orders, already in priority order, into at most `depth`
/// price levels. Orders without a price or with nothing left are ignored.
pub fn aggregate_levels<'a, I>(orders: I, depth: usize) -> Vec<PriceLevel>
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut levels: Vec<PriceLevel> = Vec::new();

    for order in orders {
        let (Some(price), remaining) = (order.price(), order.remaining()) else {
            continue;
        };
        if remaining == 0 {
            continue;
        }

        match levels.last_mut() {
            Some(level) if level.price == price => {
                level.quantity = level.quantity.saturating_add(remaining);
            }
            _ => {
                if levels.len() == depth {
                    break;
                }
                levels.push(PriceLevel::new(price, remaining));
            }
        }
    }

    levels
}

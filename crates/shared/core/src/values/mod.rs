use chrono::{DateTime, Utc};

/// Limit price in settlement currency units per unit of asset
pub type Price = u64;

/// Order or trade size in whole units of the asset
pub type Quantity = u64;

/// Balance amount held for a single ticker
pub type Amount = u64;

/// Ticker of a tradable instrument or of the settlement currency
pub type Ticker = String;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Every trade settles in this currency.
pub const SETTLEMENT_TICKER: &str = "RUB";

/// Settlement value of `quantity` units at `price`, `None` on overflow.
pub fn notional(quantity: Quantity, price: Price) -> Option<Amount> {
    quantity.checked_mul(price)
}

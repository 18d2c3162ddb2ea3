//! Bourse Core Domain
//!
//! Pure domain types for the bourse exchange: users, instruments, orders,
//! trades, balances and the events emitted when they change.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod book;
pub mod entities;
pub mod events;
pub mod instruments;
pub mod values;

// Re-export commonly used types at crate root
pub use book::{OrderBookSnapshot, PriceLevel, aggregate_levels};
pub use entities::{
    Balance, Counterparties, Order, OrderId, OrderKind, OrderRequest, OrderStatus, OrderType, Role, Side, Trade,
    TradeId, TransitionError, User, UserId, price_time_priority,
};
pub use events::{ExchangeEvent, OrderPlacedEvent, OrderStatusChangedEvent, TradeExecutedEvent};
pub use instruments::{Instrument, TickerError, validate_ticker};
pub use values::{Amount, Price, Quantity, SETTLEMENT_TICKER, Ticker, Timestamp, notional};

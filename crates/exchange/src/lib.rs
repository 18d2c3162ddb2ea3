//! Bourse exchange
//!
//! Users hold per-ticker balances and trade listed instruments against the
//! `RUB` settlement currency. Orders are matched synchronously on submission
//! by price-time priority, with balances, fills and trades committed in one
//! unit of work per request.

// Application layer
pub mod application;

// Infrastructure layer
pub mod infrastructure;

// Cross-cutting concerns
pub mod error;

// Re-export main types for convenience
pub use application::{
    Exchange, ExchangeLimits, Ledger, MatchingEngine, OrderStore, SubmitOutcome, TradeLog,
};
pub use error::{ExchangeError, LedgerError, OrderStoreError, Result};
pub use infrastructure::{
    BroadcastNotifier, ConfigError, ExchangeConfig, InMemoryExchange, InMemoryStore,
};

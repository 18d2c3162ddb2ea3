mod admin;
mod exchange;
mod ledger;
mod matching;
mod order_store;
mod trade_log;

pub use exchange::{Exchange, ExchangeLimits};
pub use ledger::Ledger;
pub use matching::{MatchingEngine, SubmitOutcome};
pub use order_store::OrderStore;
pub use trade_log::TradeLog;

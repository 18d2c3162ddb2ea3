//! Tradable instruments listed on the exchange
//!
//! Every instrument trades against the settlement currency; there are no
//! cross pairs.

mod instrument;

pub use instrument::{Instrument, TickerError, validate_ticker};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::values::{SETTLEMENT_TICKER, Ticker, Timestamp};

/// Longest ticker an instrument may be listed under
pub const MAX_TICKER_LEN: usize = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TickerError {
    #[error("Ticker must be 1..={MAX_TICKER_LEN} characters, got {0}")]
    Length(usize),

    #[error("Ticker {0:?} may only contain letters, digits, '_' or '-'")]
    Charset(String),

    #[error("Ticker {0} is reserved for settlement")]
    Reserved(String),
}

/// A listed asset that can be bought and sold for the settlement currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: Ticker,
    pub name: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl Instrument {
    pub fn new_with_time(
        ticker: impl Into<Ticker>,
        name: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
            is_active: true,
            created_at: timestamp,
        }
    }

    pub fn new(ticker: impl Into<Ticker>, name: impl Into<String>) -> Self {
        Self::new_with_time(ticker, name, Utc::now())
    }
}

/// Check a ticker proposed for a new listing
pub fn validate_ticker(ticker: &str) -> Result<(), TickerError> {
    let len = ticker.chars().count();
    if len == 0 || len > MAX_TICKER_LEN {
        return Err(TickerError::Length(len));
    }

    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(TickerError::Charset(ticker.to_string()));
    }

    if ticker == SETTLEMENT_TICKER {
        return Err(TickerError::Reserved(ticker.to_string()));
    }

    Ok(())
}

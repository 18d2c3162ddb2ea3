//! Configuration loading for the exchange
//!
//! A JSON file carries the exchange settings plus bootstrap data:
//! listed instruments, user accounts with initial deposits, and seed
//! orders for initial liquidity.

mod bootstrap;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bourse_core::{
    Amount, OrderKind, OrderRequest, Quantity, Role, SETTLEMENT_TICKER, Side, Ticker,
    validate_ticker,
};
use bourse_ports::Clock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{BroadcastNotifier, InMemoryExchange, InMemoryStore};
use crate::application::{Exchange, ExchangeLimits};
use crate::error::ExchangeError;

pub use bootstrap::{Bootstrap, DEFAULT_ADMIN, bootstrap};

/// Environment variable overriding `lock_timeout_ms`
pub const LOCK_TIMEOUT_ENV: &str = "BOURSE_LOCK_TIMEOUT_MS";

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Exchange name/identifier
    #[serde(default = "default_exchange_name")]
    pub name: String,

    /// How long a unit of work waits for a row lock before it is
    /// treated as deadlocked
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    #[serde(default = "default_max_book_depth")]
    pub max_book_depth: usize,

    #[serde(default = "default_max_trade_history")]
    pub max_trade_history: usize,

    /// Broadcast channel capacity for exchange events
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,

    #[serde(default)]
    pub users: Vec<UserConfig>,

    #[serde(default)]
    pub seed_orders: Vec<SeedOrderConfig>,
}

fn default_exchange_name() -> String {
    "Bourse".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_max_book_depth() -> usize {
    25
}

fn default_max_trade_history() -> usize {
    100
}

fn default_event_capacity() -> usize {
    10000
}

fn default_true() -> bool {
    true
}

fn default_role() -> Role {
    Role::User
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name: default_exchange_name(),
            lock_timeout_ms: default_lock_timeout_ms(),
            max_book_depth: default_max_book_depth(),
            max_trade_history: default_max_trade_history(),
            event_capacity: default_event_capacity(),
            instruments: Vec::new(),
            users: Vec::new(),
            seed_orders: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub ticker: Ticker,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Unique within the file; seed orders refer to users by name
    pub name: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub deposits: Vec<DepositConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositConfig {
    pub ticker: Ticker,
    pub amount: Amount,
}

/// Order placed during bootstrap, in file order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedOrderConfig {
    pub user: String,
    pub ticker: Ticker,
    pub side: Side,
    pub quantity: Quantity,
    #[serde(flatten)]
    pub kind: OrderKind,
}

impl SeedOrderConfig {
    pub fn to_request(&self) -> OrderRequest {
        OrderRequest {
            ticker: self.ticker.clone(),
            side: self.side,
            quantity: self.quantity,
            kind: self.kind,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[from] ExchangeError),
}

impl ExchangeConfig {
    /// Load and validate configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BOURSE_LOCK_TIMEOUT_MS` if set
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_lock_timeout_override(std::env::var(LOCK_TIMEOUT_ENV).ok().as_deref())
    }

    fn with_lock_timeout_override(mut self, value: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(raw) = value {
            self.lock_timeout_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{LOCK_TIMEOUT_ENV}={raw:?} is not a number"))
            })?;
            self.validate()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid("lock_timeout_ms must be positive".into()));
        }
        let caps = [
            ("max_book_depth", self.max_book_depth),
            ("max_trade_history", self.max_trade_history),
            ("event_capacity", self.event_capacity),
        ];
        if let Some((field, _)) = caps.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{field} must be positive")));
        }

        let mut tickers = HashSet::new();
        for instrument in &self.instruments {
            validate_ticker(&instrument.ticker)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if !tickers.insert(instrument.ticker.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate instrument {}",
                    instrument.ticker
                )));
            }
        }

        let mut names = HashSet::new();
        for user in &self.users {
            if user.name.trim().is_empty() {
                return Err(ConfigError::Invalid("user name must not be empty".into()));
            }
            if !names.insert(user.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate user {}", user.name)));
            }
            for deposit in &user.deposits {
                if deposit.ticker != SETTLEMENT_TICKER
                    && !tickers.contains(deposit.ticker.as_str())
                {
                    return Err(ConfigError::Invalid(format!(
                        "user {} deposits unknown ticker {}",
                        user.name, deposit.ticker
                    )));
                }
            }
        }

        for seed in &self.seed_orders {
            if !names.contains(seed.user.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "seed order references unknown user {}",
                    seed.user
                )));
            }
            if !tickers.contains(seed.ticker.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "seed order references unknown instrument {}",
                    seed.ticker
                )));
            }
        }

        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn limits(&self) -> ExchangeLimits {
        ExchangeLimits {
            max_book_depth: self.max_book_depth,
            max_trade_history: self.max_trade_history,
        }
    }

    /// Empty in-memory exchange wired with these settings
    pub fn build_exchange<C: Clock>(&self, clock: Arc<C>) -> InMemoryExchange<C> {
        let store = Arc::new(InMemoryStore::with_lock_timeout(self.lock_timeout()));
        Exchange::new(
            clock,
            Arc::clone(&store),
            Arc::clone(&store),
            store,
            Arc::new(BroadcastNotifier::new(self.event_capacity)),
            self.limits(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "Test Bourse",
        "lock_timeout_ms": 500,
        "instruments": [
            { "ticker": "MEMCOIN", "name": "Meme coin" },
            { "ticker": "OLD", "name": "Suspended", "active": false }
        ],
        "users": [
            { "name": "maker", "deposits": [ { "ticker": "MEMCOIN", "amount": 100 } ] },
            { "name": "taker", "deposits": [ { "ticker": "RUB", "amount": 5000 } ] },
            { "name": "root", "role": "ADMIN" }
        ],
        "seed_orders": [
            { "user": "maker", "ticker": "MEMCOIN", "side": "SELL", "quantity": 10, "type": "LIMIT", "price": 50 },
            { "user": "taker", "ticker": "MEMCOIN", "side": "BUY", "quantity": 2, "type": "MARKET" }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = ExchangeConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.name, "Test Bourse");
        assert_eq!(config.lock_timeout(), Duration::from_millis(500));
        assert_eq!(config.max_book_depth, 25);
        assert_eq!(config.max_trade_history, 100);
        assert!(!config.instruments[1].active);
        assert_eq!(config.users[2].role, Role::Admin);
        assert_eq!(config.users[0].role, Role::User);
        assert_eq!(config.seed_orders[0].kind, OrderKind::Limit { price: 50 });
        assert_eq!(config.seed_orders[1].to_request().kind, OrderKind::Market);
    }

    #[test]
    fn test_defaults() {
        let config = ExchangeConfig::from_json("{}").unwrap();
        assert_eq!(config, ExchangeConfig::default());
        assert_eq!(config.limits(), ExchangeLimits::default());
    }

    #[test]
    fn test_rejects_zero_caps() {
        let err = ExchangeConfig::from_json(r#"{ "max_book_depth": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("max_book_depth")));
    }

    #[test]
    fn test_lock_timeout_checked_at_full_width() {
        let err = ExchangeConfig::from_json(r#"{ "lock_timeout_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("lock_timeout_ms")));

        // Low 32 bits are zero
        let config = ExchangeConfig::from_json(r#"{ "lock_timeout_ms": 4294967296 }"#).unwrap();
        assert_eq!(config.lock_timeout_ms, 1 << 32);
    }

    #[test]
    fn test_rejects_duplicate_tickers() {
        let json = r#"{ "instruments": [
            { "ticker": "A", "name": "a" }, { "ticker": "A", "name": "again" }
        ] }"#;
        assert!(matches!(
            ExchangeConfig::from_json(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_dangling_seed_orders() {
        let json = r#"{
            "instruments": [ { "ticker": "A", "name": "a" } ],
            "seed_orders": [ { "user": "ghost", "ticker": "A", "side": "BUY", "quantity": 1, "type": "MARKET" } ]
        }"#;
        assert!(matches!(
            ExchangeConfig::from_json(json),
            Err(ConfigError::Invalid(msg)) if msg.contains("ghost")
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            ExchangeConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_lock_timeout_override() {
        let config = ExchangeConfig::default()
            .with_lock_timeout_override(Some("150"))
            .unwrap();
        assert_eq!(config.lock_timeout_ms, 150);

        assert!(
            ExchangeConfig::default()
                .with_lock_timeout_override(Some("soon"))
                .is_err()
        );
        assert!(
            ExchangeConfig::default()
                .with_lock_timeout_override(Some("0"))
                .is_err()
        );
        assert_eq!(
            ExchangeConfig::default()
                .with_lock_timeout_override(None)
                .unwrap()
                .lock_timeout_ms,
            2000
        );
    }

    #[test]
    fn test_missing_file() {
        let err = ExchangeConfig::from_file("/nonexistent/bourse.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

pub mod config;
pub mod logging;
pub mod notifier;
pub mod store;

use bourse_clock::SystemClock;

use crate::application::Exchange;

pub use config::{ConfigError, ExchangeConfig};
pub use notifier::BroadcastNotifier;
pub use store::{InMemoryStore, InMemoryTransaction};

/// Exchange backed by the in-memory store and the broadcast notifier
pub type InMemoryExchange<C = SystemClock> =
    Exchange<C, InMemoryStore, InMemoryStore, InMemoryStore, BroadcastNotifier>;

#![allow(dead_code)]

use std::sync::Arc;

use bourse_clock::ManualClock;
use bourse_core::{Amount, User, UserId};
use bourse_exchange::{ExchangeConfig, InMemoryExchange};

pub type TestExchange = InMemoryExchange<ManualClock>;

pub const TICKER: &str = "MEMCOIN";

/// Exchange with one admin and one listed instrument
pub struct Market {
    pub exchange: Arc<TestExchange>,
    pub admin: User,
}

impl Market {
    pub async fn new() -> Self {
        Self::with_config(ExchangeConfig::default()).await
    }

    pub async fn with_config(config: ExchangeConfig) -> Self {
        let _ = env_logger::try_init();

        let exchange = config.build_exchange(Arc::new(ManualClock::default()));
        let admin = exchange.create_admin("root").await.unwrap();
        exchange
            .create_instrument(admin.id, TICKER, "Meme coin")
            .await
            .unwrap();

        Self {
            exchange: Arc::new(exchange),
            admin,
        }
    }

    /// Register a user and fund them
    pub async fn user(&self, name: &str, deposits: &[(&str, Amount)]) -> UserId {
        let user = self.exchange.register_user(name).await.unwrap();
        for (ticker, amount) in deposits {
            self.exchange
                .deposit(self.admin.id, user.id, ticker, *amount)
                .await
                .unwrap();
        }
        user.id
    }

    pub async fn balance(&self, user: UserId, ticker: &str) -> Amount {
        self.exchange.get_balance(user, ticker).await.unwrap()
    }
}

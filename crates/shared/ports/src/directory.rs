use async_trait::async_trait;
use bourse_core::{Role, UserId};

/// Read-only user lookup
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: UserId) -> bool;

    /// `None` when the user is unknown
    async fn role(&self, user_id: UserId) -> Option<Role>;
}

/// Read-only instrument lookup
#[async_trait]
pub trait InstrumentDirectory: Send + Sync {
    async fn exists(&self, ticker: &str) -> bool;

    /// Unknown tickers are never active
    async fn is_active(&self, ticker: &str) -> bool;
}

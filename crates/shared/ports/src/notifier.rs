use async_trait::async_trait;
use bourse_core::ExchangeEvent;

use crate::error::NotifyError;

/// Downstream fan-out of committed changes
///
/// Delivery is at-most-once from the caller's point of view: callers do
/// not retry, and a failed publish never undoes the change it describes.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn publish(&self, event: ExchangeEvent) -> Result<(), NotifyError>;
}

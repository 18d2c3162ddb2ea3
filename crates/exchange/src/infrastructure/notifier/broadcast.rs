use std::sync::Arc;

use async_trait::async_trait;
use bourse_core::ExchangeEvent;
use bourse_ports::{EventNotifier, NotifyError};
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Broadcast-based event notifier
///
/// Every event goes to the global channel and to the channel of its
/// ticker, if anyone has subscribed to that ticker. A send with no
/// receivers is not an error.
pub struct BroadcastNotifier {
    global_tx: broadcast::Sender<ExchangeEvent>,
    ticker_channels: Arc<DashMap<String, broadcast::Sender<ExchangeEvent>>>,
    capacity: usize,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (global_tx, _) = broadcast::channel(capacity);

        BroadcastNotifier {
            global_tx,
            ticker_channels: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.global_tx.subscribe()
    }

    /// Subscribe to events for one ticker
    pub fn subscribe_ticker(&self, ticker: &str) -> broadcast::Receiver<ExchangeEvent> {
        let entry = self
            .ticker_channels
            .entry(ticker.to_string())
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            });

        entry.value().subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(10000)
    }
}

impl Clone for BroadcastNotifier {
    fn clone(&self) -> Self {
        BroadcastNotifier {
            global_tx: self.global_tx.clone(),
            ticker_channels: Arc::clone(&self.ticker_channels),
            capacity: self.capacity,
        }
    }
}

#[async_trait]
impl EventNotifier for BroadcastNotifier {
    async fn publish(&self, event: ExchangeEvent) -> Result<(), NotifyError> {
        if let Some(tx) = self.ticker_channels.get(event.ticker()) {
            // No subscribers left is fine
            let _ = tx.send(event.clone());
        }

        let _ = self.global_tx.send(event);
        Ok(())
    }
}

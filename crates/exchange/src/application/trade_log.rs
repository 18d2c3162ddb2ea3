use bourse_core::Trade;
use bourse_ports::{StoreResult, Transaction};

/// Append-only record of executed trades
#[derive(Debug, Default, Clone, Copy)]
pub struct TradeLog;

impl TradeLog {
    pub fn new() -> Self {
        Self
    }

    pub async fn record<T: Transaction>(&self, tx: &mut T, trade: Trade) -> StoreResult<()> {
        tx.append_trade(trade).await
    }

    /// Most recent first
    pub async fn history<T: Transaction>(
        &self,
        tx: &mut T,
        ticker: &str,
        limit: usize,
    ) -> StoreResult<Vec<Trade>> {
        tx.trades(ticker, limit).await
    }
}

use std::collections::BTreeMap;

use bourse_core::{Amount, Balance, Ticker, UserId};
use bourse_ports::Transaction;

use crate::error::LedgerError;

/// Per-(user, ticker) balances
///
/// Every operation runs inside the caller's unit of work; nothing here
/// commits on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ledger;

impl Ledger {
    pub fn new() -> Self {
        Self
    }

    /// Current amount, zero when the row does not exist
    pub async fn get_balance<T: Transaction>(
        &self,
        tx: &mut T,
        user_id: UserId,
        ticker: &str,
    ) -> Result<Amount, LedgerError> {
        Ok(tx
            .balance(user_id, ticker)
            .await?
            .map(|b| b.amount)
            .unwrap_or(0))
    }

    /// Like [`Ledger::get_balance`] but takes the row lock first, so the
    /// amount cannot move until the unit of work ends.
    pub async fn lock_balance<T: Transaction>(
        &self,
        tx: &mut T,
        user_id: UserId,
        ticker: &str,
    ) -> Result<Amount, LedgerError> {
        Ok(tx
            .lock_balance(user_id, ticker)
            .await?
            .map(|b| b.amount)
            .unwrap_or(0))
    }

    /// Apply `amount += delta` and return the new amount.
    ///
    /// The row is locked before the solvency check, so the check sees the
    /// latest committed or pending value. A missing row is created.
    pub async fn adjust<T: Transaction>(
        &self,
        tx: &mut T,
        user_id: UserId,
        ticker: &str,
        delta: i64,
    ) -> Result<Amount, LedgerError> {
        let current = tx
            .lock_balance(user_id, ticker)
            .await?
            .unwrap_or_else(|| Balance::zero(user_id, ticker));

        // Checked after the lock so a concurrent user deletion is observed
        if tx.user(user_id).await?.is_none() {
            return Err(LedgerError::UnknownUser(user_id));
        }

        if delta == 0 {
            return Ok(current.amount);
        }

        let updated = current.checked_apply(delta).ok_or_else(|| {
            if delta < 0 {
                LedgerError::InsufficientFunds {
                    user_id,
                    ticker: ticker.to_string(),
                    required: delta.unsigned_abs(),
                    available: current.amount,
                }
            } else {
                LedgerError::Overflow {
                    user_id,
                    ticker: ticker.to_string(),
                }
            }
        })?;

        tx.save_balance(Balance::new(user_id, ticker, updated))
            .await?;
        Ok(updated)
    }

    /// All non-empty balances of a user, keyed by ticker
    pub async fn balances<T: Transaction>(
        &self,
        tx: &mut T,
        user_id: UserId,
    ) -> Result<BTreeMap<Ticker, Amount>, LedgerError> {
        Ok(tx
            .balances_by_user(user_id)
            .await?
            .into_iter()
            .map(|b| (b.ticker, b.amount))
            .collect())
    }

    /// Remove every balance row of a user. Returns what was removed.
    pub async fn close_account<T: Transaction>(
        &self,
        tx: &mut T,
        user_id: UserId,
    ) -> Result<Vec<Balance>, LedgerError> {
        let rows = tx.balances_by_user(user_id).await?;
        for row in &rows {
            tx.lock_balance(user_id, &row.ticker).await?;
            tx.delete_balance(user_id, &row.ticker).await?;
        }
        Ok(rows)
    }
}

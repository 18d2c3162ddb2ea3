use serde::{Deserialize, Serialize};

use super::UserId;
use crate::values::{Amount, Ticker};

/// Holdings of one user in one ticker. Rows with no history read as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: UserId,
    pub ticker: Ticker,
    pub amount: Amount,
}

impl Balance {
    pub fn new(user_id: UserId, ticker: impl Into<Ticker>, amount: Amount) -> Self {
        Self {
            user_id,
            ticker: ticker.into(),
            amount,
        }
    }

    pub fn zero(user_id: UserId, ticker: impl Into<Ticker>) -> Self {
        Self::new(user_id, ticker, 0)
    }

    /// Apply a signed change, refusing to go negative or overflow
    pub fn checked_apply(&self, delta: i64) -> Option<Amount> {
        if delta >= 0 {
            self.amount.checked_add(delta.unsigned_abs())
        } else {
            self.amount.checked_sub(delta.unsigned_abs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_checked_apply() {
        let balance = Balance::new(Uuid::new_v4(), "RUB", 100);
        assert_eq!(balance.checked_apply(-100), Some(0));
        assert_eq!(balance.checked_apply(-101), None);
        assert_eq!(balance.checked_apply(5), Some(105));
        assert_eq!(Balance::new(Uuid::nil(), "RUB", u64::MAX).checked_apply(1), None);
        assert_eq!(balance.checked_apply(i64::MIN), None);
    }
}

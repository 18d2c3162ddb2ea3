use serde::{Deserialize, Serialize};
use std::fmt;

use crate::values::Quantity;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted, nothing filled yet
    New,
    /// Some but not all of the quantity has traded
    PartiallyExecuted,
    /// The whole quantity has traded
    Executed,
    /// Withdrawn by its owner
    Cancelled,
}

impl OrderStatus {
    /// Status implied by a fill level.
    pub fn for_fill(filled: Quantity, quantity: Quantity) -> Self {
        if filled >= quantity {
            OrderStatus::Executed
        } else if filled > 0 {
            OrderStatus::PartiallyExecuted
        } else {
            OrderStatus::New
        }
    }

    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Executed | OrderStatus::Cancelled)
    }

    /// Returns true if the order can still trade or be cancelled
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyExecuted)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::PartiallyExecuted => write!(f, "PARTIALLY_EXECUTED"),
            OrderStatus::Executed => write!(f, "EXECUTED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

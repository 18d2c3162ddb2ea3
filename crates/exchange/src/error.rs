use bourse_core::{Amount, OrderId, Ticker, TransitionError, UserId};
use bourse_ports::StoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient funds: user {user_id} needs {required} {ticker}, has {available}")]
    InsufficientFunds {
        user_id: UserId,
        ticker: Ticker,
        required: Amount,
        available: Amount,
    },

    #[error("No liquidity on {0}")]
    NoLiquidity(Ticker),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid cancellation: {0}")]
    InvalidCancellation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Unexpected store failure. `retryable` is set when the unit of work
    /// was aborted by lock contention and may succeed if run again.
    #[error("Internal error: {message}")]
    Internal { message: String, retryable: bool },
}

impl ExchangeError {
    pub fn internal(message: impl Into<String>) -> Self {
        ExchangeError::Internal {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::Internal {
                retryable: true,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;

impl From<StoreError> for ExchangeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout { .. } => ExchangeError::Internal {
                message: err.to_string(),
                retryable: true,
            },
            StoreError::Conflict { row } => ExchangeError::Conflict(row),
            StoreError::RowNotLocked { .. } | StoreError::Unavailable(_) => {
                ExchangeError::internal(err.to_string())
            }
        }
    }
}

/// Balance mutation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("User {user_id} needs {required} {ticker}, has {available}")]
    InsufficientFunds {
        user_id: UserId,
        ticker: Ticker,
        required: Amount,
        available: Amount,
    },

    #[error("Unknown user {0}")]
    UnknownUser(UserId),

    #[error("Balance of {ticker} for user {user_id} would overflow")]
    Overflow { user_id: UserId, ticker: Ticker },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LedgerError> for ExchangeError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                user_id,
                ticker,
                required,
                available,
            } => ExchangeError::InsufficientFunds {
                user_id,
                ticker,
                required,
                available,
            },
            LedgerError::UnknownUser(id) => ExchangeError::NotFound(format!("user {id}")),
            LedgerError::Overflow { .. } => ExchangeError::InvalidInput(err.to_string()),
            LedgerError::Store(e) => e.into(),
        }
    }
}

/// Order lifecycle failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderStoreError {
    #[error("Order {0} not found")]
    NotFound(OrderId),

    #[error("Invalid transition: {0}")]
    InvalidTransition(TransitionError),

    #[error("Invalid cancellation: {0}")]
    InvalidCancellation(TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<OrderStoreError> for ExchangeError {
    fn from(err: OrderStoreError) -> Self {
        match err {
            OrderStoreError::NotFound(id) => ExchangeError::NotFound(format!("order {id}")),
            OrderStoreError::InvalidTransition(e) => ExchangeError::InvalidTransition(e.to_string()),
            OrderStoreError::InvalidCancellation(e) => {
                ExchangeError::InvalidCancellation(e.to_string())
            }
            OrderStoreError::Store(e) => e.into(),
        }
    }
}

use thiserror::Error;

/// Failures raised by the transactional store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Waiting for a row lock exceeded the store's deadline. Treated as a
    /// deadlock: the unit of work is aborted and may be retried.
    #[error("Timed out waiting for lock on {row}")]
    LockTimeout { row: String },

    #[error("Write to {row} without holding its lock")]
    RowNotLocked { row: String },

    #[error("Row {row} already exists")]
    Conflict { row: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, StoreError::LockTimeout { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Notifier closed")]
    Closed,

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

use bourse_core::Timestamp;

/// Port for time abstraction
///
/// Production uses wall time; tests use a manually driven clock so that
/// `created_at` ordering is deterministic.
pub trait Clock: Send + Sync {
    /// Get the current time according to this clock
    fn now(&self) -> Timestamp;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }
}

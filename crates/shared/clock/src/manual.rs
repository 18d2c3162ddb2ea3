use bourse_core::Timestamp;
use bourse_ports::Clock;
use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;

/// Manually driven clock for deterministic tests
///
/// Time stands still unless [`ManualClock::advance`] is called. A
/// ticking clock additionally
/// moves forward by `step` after every read, so successive orders get
/// strictly increasing timestamps.
pub struct ManualClock {
    current: Mutex<Timestamp>,
    step: Duration,
}

impl ManualClock {
    /// Clock frozen at `start`
    pub fn fixed(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
            step: Duration::zero(),
        }
    }

    /// Clock that advances by `step` after each `now()`
    pub fn ticking(start: Timestamp, step: Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock();
        *current += duration;
    }
}

impl Default for ManualClock {
    /// Ticking by one millisecond from 2024-01-01T00:00:00Z
    fn default() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::ticking(start, Duration::milliseconds(1))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let mut current = self.current.lock();
        let now = *current;
        *current += self.step;
        now
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}

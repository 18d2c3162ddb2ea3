//! Bourse Clock Infrastructure
//!
//! Two time sources behind the [`Clock`] port:
//!
//! - [`SystemClock`]: wall time, used by the binary.
//! - [`ManualClock`]: frozen time that only moves when told to, or by a
//!   fixed step on every read. Tests use it to pin `created_at` ordering.
//!
//! ```ignore
//! use bourse_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::ticking(start, Duration::milliseconds(1));
//! let t1 = clock.now();
//! let t2 = clock.now(); // t1 + 1ms
//! clock.advance(Duration::minutes(5));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use bourse_ports::Clock;

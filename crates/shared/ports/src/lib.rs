//! Bourse Ports
//!
//! Port definitions (traits) for the bourse exchange.
//! These define the boundaries between the matching core and the
//! collaborators it consumes: time, user and instrument lookup, the
//! transactional store and the event notifier.

mod clock;
mod directory;
mod error;
mod notifier;
mod store;

pub use clock::Clock;
pub use directory::{InstrumentDirectory, UserDirectory};
pub use error::{NotifyError, StoreError, StoreResult};
pub use notifier::EventNotifier;
pub use store::{Store, Transaction};

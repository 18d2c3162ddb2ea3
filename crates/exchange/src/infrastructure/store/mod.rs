mod in_memory;
mod locks;

pub use in_memory::{InMemoryStore, InMemoryTransaction};

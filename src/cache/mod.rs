//! Cache Module
//!
//! The Entry Store: cache entries with TTL and access metadata behind the
//! [`EntryStore`] interface, with an in-process and a remote backend.

mod entry;
mod memory;
mod remote;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{CacheEntry, Category, EntryMeta};
pub use memory::MemoryStore;
pub use remote::RemoteStore;
pub use stats::{CacheStats, StatsCounters};
pub use store::EntryStore;

//! Entry Store Module
//!
//! Two-tier caching with TTL classification, LRU ordering on the
//! in-process tier and a pluggable persisted tier.

mod backend;
mod entry;
mod policy;
mod recency;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use backend::{MemoryBackend, PersistenceBackend};
pub use entry::CacheEntry;
pub use policy::{ExpirationPolicy, Freshness};
pub use recency::RecencyLedger;
pub use stats::{StatsRecorder, StatsSnapshot};
pub use store::EntryStore;

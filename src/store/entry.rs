//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with versioning
//! and TTL metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// A single cached record, shared between the in-process and persisted tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Opaque key this entry is stored under
    pub key: String,
    /// The cached payload
    pub value: Value,
    /// Per-key sequence number; strictly increases on every successful write
    pub version: u64,
    /// Timestamp of the first successful load (Unix milliseconds)
    pub created_at: u64,
    /// Timestamp of the most recent read (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Timestamp of the most recent write (Unix milliseconds)
    pub last_written_at: u64,
    /// Time-to-live in milliseconds, measured from `last_written_at`
    pub ttl_ms: u64,
    /// Approximate payload footprint, from the serialized length
    pub size_hint: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates the first version of an entry for a key.
    pub fn new(key: String, value: Value, ttl_ms: u64, now: u64) -> Self {
        let size_hint = estimate_size(&value);
        Self {
            key,
            value,
            version: 1,
            created_at: now,
            last_accessed_at: now,
            last_written_at: now,
            ttl_ms,
            size_hint,
        }
    }

    // == Refresh ==
    /// Builds the successor entry for a refresh write.
    ///
    /// Keeps the creation time and continues the version sequence, so
    /// readers never observe a version decrease for a key.
    pub fn refreshed(previous: &CacheEntry, value: Value, ttl_ms: u64, now: u64) -> Self {
        let size_hint = estimate_size(&value);
        Self {
            key: previous.key.clone(),
            value,
            version: previous.version + 1,
            created_at: previous.created_at,
            last_accessed_at: now,
            last_written_at: now,
            ttl_ms,
            size_hint,
        }
    }

    // == Touch ==
    /// Records a read of this entry.
    pub fn touch(&mut self, now: u64) {
        self.last_accessed_at = now;
    }

    // == Age ==
    /// Milliseconds since the entry was first created.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }
}

/// Approximates the in-memory footprint of a payload from its serialized length.
fn estimate_size(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

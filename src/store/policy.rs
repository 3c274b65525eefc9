//! Expiration Policy Module
//!
//! Pure fresh/stale/expired classification relative to a supplied "now".
//! The clock is always injected by the caller, never read from the
//! environment, so classification stays deterministic under test.

use serde::Serialize;

use crate::store::CacheEntry;

// == Freshness ==
/// Classification of an entry relative to its TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Within TTL; served as-is.
    Fresh,
    /// Past TTL but within the grace window; served while a background
    /// refresh is triggered.
    Stale,
    /// Past the grace window; never served, must be reloaded synchronously.
    Expired,
}

// == Expiration Policy ==
/// Classifies entries against their TTL with a configurable grace multiplier.
#[derive(Debug, Clone, Copy)]
pub struct ExpirationPolicy {
    stale_grace: f64,
}

impl ExpirationPolicy {
    /// Creates a policy with the given stale-grace multiplier.
    ///
    /// A grace below 1.0 would make entries expire before going stale,
    /// so the multiplier is floored at 1.0.
    pub fn new(stale_grace: f64) -> Self {
        Self {
            stale_grace: stale_grace.max(1.0),
        }
    }

    // == Classify ==
    /// Classifies an entry at the supplied time.
    ///
    /// - `Fresh` while `now - last_written_at < ttl`
    /// - `Stale` while `ttl <= now - last_written_at < ttl * stale_grace`
    /// - `Expired` beyond that
    pub fn classify(&self, entry: &CacheEntry, now: u64) -> Freshness {
        let age_ms = now.saturating_sub(entry.last_written_at);
        if age_ms < entry.ttl_ms {
            Freshness::Fresh
        } else if (age_ms as f64) < entry.ttl_ms as f64 * self.stale_grace {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::new(2.0)
    }
}

//! Access Recency Ledger Module
//!
//! Orders hot-tier keys by access recency so capacity overflow discards
//! the coldest key first. Every touch stamps the key with a monotonically
//! increasing tick, which keeps the ordering exact even when two accesses
//! land in the same clock millisecond.

use std::collections::HashMap;

// == Recency Ledger ==
/// Tick-stamped access order for the in-process tier.
///
/// Touching is O(1); finding the coldest key is a scan over the ledger,
/// which suits a read-heavy hot tier where overflow is the rare case.
#[derive(Debug, Default)]
pub struct RecencyLedger {
    ticks: HashMap<String, u64>,
    next_tick: u64,
}

impl RecencyLedger {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Stamps a key as the most recently used.
    pub fn touch(&mut self, key: &str) {
        self.next_tick += 1;
        self.ticks.insert(key.to_string(), self.next_tick);
    }

    // == Remove ==
    /// Drops a key from the ledger. Returns whether it was tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        self.ticks.remove(key).is_some()
    }

    // == Coldest ==
    /// The least recently used key, if any.
    pub fn coldest(&self) -> Option<&str> {
        self.ticks
            .iter()
            .min_by_key(|(_, tick)| **tick)
            .map(|(key, _)| key.as_str())
    }

    /// Removes and returns the least recently used key.
    pub fn take_coldest(&mut self) -> Option<String> {
        let key = self.coldest()?.to_string();
        self.ticks.remove(&key);
        Some(key)
    }

    // == Clear ==
    /// Drops all tracked keys.
    pub fn clear(&mut self) {
        self.ticks.clear();
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_starts_empty() {
        let ledger = RecencyLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.coldest(), None);
    }

    #[test]
    fn test_first_touched_is_coldest() {
        let mut ledger = RecencyLedger::new();
        ledger.touch("fund:a");
        ledger.touch("fund:b");
        ledger.touch("fund:c");

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.coldest(), Some("fund:a"));
    }

    #[test]
    fn test_retouching_warms_a_key() {
        let mut ledger = RecencyLedger::new();
        ledger.touch("fund:a");
        ledger.touch("fund:b");
        ledger.touch("fund:a");

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.coldest(), Some("fund:b"));
    }

    #[test]
    fn test_take_coldest_drains_in_access_order() {
        let mut ledger = RecencyLedger::new();
        ledger.touch("a");
        ledger.touch("b");
        ledger.touch("c");
        ledger.touch("a"); // "a" warms past "b" and "c"

        assert_eq!(ledger.take_coldest(), Some("b".to_string()));
        assert_eq!(ledger.take_coldest(), Some("c".to_string()));
        assert_eq!(ledger.take_coldest(), Some("a".to_string()));
        assert_eq!(ledger.take_coldest(), None);
    }

    #[test]
    fn test_remove_untracks_a_key() {
        let mut ledger = RecencyLedger::new();
        ledger.touch("fund:a");
        ledger.touch("fund:b");

        assert!(ledger.remove("fund:a"));
        assert!(!ledger.remove("fund:a"));
        assert_eq!(ledger.coldest(), Some("fund:b"));
    }

    #[test]
    fn test_clear_resets_the_ledger() {
        let mut ledger = RecencyLedger::new();
        ledger.touch("fund:a");
        ledger.clear();

        assert!(ledger.is_empty());
        assert_eq!(ledger.take_coldest(), None);
    }

    #[test]
    fn test_ticks_disambiguate_same_instant_accesses() {
        // No clock involved at all: two touches in the same millisecond
        // still have a well-defined order
        let mut ledger = RecencyLedger::new();
        ledger.touch("first");
        ledger.touch("second");

        assert_eq!(ledger.coldest(), Some("first"));
    }
}

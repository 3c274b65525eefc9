//! Property-Based Tests for the Entry Store
//!
//! Uses proptest to verify version monotonicity, capacity enforcement
//! and LRU eviction order on the in-process tier.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::ManualClock;
use crate::config::Config;
use crate::store::{EntryStore, MemoryBackend, StatsRecorder};
use crate::strategy::StrategyEngine;

fn build_store(max_hot_entries: usize, clock: Arc<ManualClock>) -> EntryStore {
    let config = Config {
        max_hot_entries,
        default_ttl_ms: 600_000,
        ..Config::default()
    };
    let strategies = Arc::new(StrategyEngine::new(
        clock.clone(),
        config.strategy_retention_ms,
    ));
    EntryStore::new(
        &config,
        Arc::new(MemoryBackend::new()),
        strategies,
        Arc::new(StatsRecorder::new()),
        clock,
    )
}

/// Generates valid cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9:_]{1,24}".prop_map(|s| s)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // *For any* write sequence, observed versions strictly increase per key.
    #[test]
    fn prop_version_monotonicity(
        writes in prop::collection::vec((valid_key_strategy(), 0.0f64..10_000.0), 1..60)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = build_store(1000, Arc::new(ManualClock::new(0)));
            let mut last_seen: std::collections::HashMap<String, u64> = Default::default();

            for (key, price) in writes {
                store.put(&key, serde_json::json!(price), None).await;
                let entry = store.get(&key).await.unwrap();
                if let Some(prev) = last_seen.get(&key) {
                    prop_assert!(entry.version > *prev, "version went backwards for {}", key);
                }
                last_seen.insert(key, entry.version);
            }
            Ok(())
        })?;
    }

    // *For any* write sequence, the hot tier never exceeds its capacity.
    #[test]
    fn prop_hot_tier_capacity_enforcement(
        writes in prop::collection::vec(valid_key_strategy(), 1..120)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let max_entries = 25;
            let store = build_store(max_entries, Arc::new(ManualClock::new(0)));

            for key in writes {
                store.put(&key, serde_json::json!(1.0), None).await;
                let occupancy = store.hot_len().await;
                prop_assert!(
                    occupancy <= max_entries,
                    "hot tier at {} exceeds capacity {}",
                    occupancy,
                    max_entries
                );
            }
            Ok(())
        })?;
    }

    // *For any* distinct key set written in order, capacity overflow
    // discards the least recently used key first, and an overflow write
    // never loses the value entirely (the persisted tier still holds it).
    #[test]
    fn prop_lru_eviction_order(
        keys in prop::collection::vec(valid_key_strategy(), 3..10),
        new_key in valid_key_strategy()
    ) {
        let unique_keys: Vec<String> = keys
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        prop_assume!(unique_keys.len() >= 2);
        prop_assume!(!unique_keys.contains(&new_key));

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let clock = Arc::new(ManualClock::new(0));
            let store = build_store(unique_keys.len(), clock.clone());

            for key in &unique_keys {
                clock.advance(1_000);
                store.put(key, serde_json::json!(1.0), None).await;
            }

            let oldest = unique_keys[0].clone();
            clock.advance(1_000);
            store.put(&new_key, serde_json::json!(2.0), None).await;

            // The oldest write left the hot tier, everything else stayed
            prop_assert!(store.peek_hot(&oldest).await.is_none());
            prop_assert!(store.peek_hot(&new_key).await.is_some());
            for key in unique_keys.iter().skip(1) {
                prop_assert!(store.peek_hot(key).await.is_some(), "{} was evicted early", key);
            }

            // Zero loss: the evicted key is still retrievable
            prop_assert!(store.get(&oldest).await.is_some());
            Ok(())
        })?;
    }

    // *For any* access pattern, a key read via get is not the next
    // eviction candidate.
    #[test]
    fn prop_lru_access_tracking(
        keys in prop::collection::vec(valid_key_strategy(), 3..8),
        new_key in valid_key_strategy()
    ) {
        let unique_keys: Vec<String> = keys
            .into_iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        prop_assume!(unique_keys.len() >= 3);
        prop_assume!(!unique_keys.contains(&new_key));

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let clock = Arc::new(ManualClock::new(0));
            let store = build_store(unique_keys.len(), clock.clone());

            for key in &unique_keys {
                clock.advance(1_000);
                store.put(key, serde_json::json!(1.0), None).await;
            }

            // Touch the LRU candidate; its neighbor becomes next in line
            clock.advance(1_000);
            let _ = store.get(&unique_keys[0]).await;

            clock.advance(1_000);
            store.put(&new_key, serde_json::json!(2.0), None).await;

            prop_assert!(store.peek_hot(&unique_keys[0]).await.is_some());
            prop_assert!(store.peek_hot(&unique_keys[1]).await.is_none());
            Ok(())
        })?;
    }
}

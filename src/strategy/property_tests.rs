//! Property-Based Tests for the Strategy Module
//!
//! Uses proptest to verify the interval bounds invariant and the
//! drift behavior of the adaptive analysis.

use proptest::prelude::*;
use std::sync::Arc;

use crate::clock::ManualClock;
use crate::strategy::{StrategyEngine, StrategyPreset, StrategySeed};

fn preset_strategy() -> impl Strategy<Value = StrategyPreset> {
    prop_oneof![
        Just(StrategyPreset::HighFrequency),
        Just(StrategyPreset::Balanced),
        Just(StrategyPreset::LowFrequency),
        Just(StrategyPreset::Adaptive),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // *For any* sequence of adjust_frequency calls, the current interval
    // stays within [floor, ceiling].
    #[test]
    fn prop_interval_bounds_invariant(
        preset in preset_strategy(),
        adjustments in prop::collection::vec(any::<bool>(), 1..60)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let engine = StrategyEngine::new(Arc::new(ManualClock::new(0)), u64::MAX);
            engine.register("k", preset).await;

            for increase in adjustments {
                let interval = engine.adjust_frequency("k", increase).await.unwrap();
                let snapshot = engine.get("k").await.unwrap();
                prop_assert!(interval >= snapshot.floor_ms);
                prop_assert!(interval <= snapshot.ceiling_ms);
            }
            Ok(())
        })?;
    }

    // *For any* mix of accesses, writes and batch analyses, the invariant
    // still holds after adaptive drift.
    #[test]
    fn prop_adaptive_drift_stays_bounded(
        preset in preset_strategy(),
        steps in prop::collection::vec((0u8..3, 0u64..600_000), 1..40)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let clock = Arc::new(ManualClock::new(0));
            let engine = StrategyEngine::new(clock.clone(), u64::MAX);
            engine.register("k", preset).await;

            let mut price = 100.0f64;
            for (op, delta_ms) in steps {
                clock.advance(delta_ms);
                match op {
                    0 => engine.record_access("k").await,
                    1 => {
                        let previous = serde_json::json!(price);
                        price *= 1.3;
                        engine.record_write("k", Some(&previous), &serde_json::json!(price)).await;
                    }
                    _ => {
                        engine.batch_update(&["k".to_string()]).await;
                    }
                }
                let snapshot = engine.get("k").await.unwrap();
                prop_assert!(snapshot.current_interval_ms >= snapshot.floor_ms);
                prop_assert!(snapshot.current_interval_ms <= snapshot.ceiling_ms);
                prop_assert!(snapshot.volatility >= 0.0 && snapshot.volatility <= 1.0);
            }
            Ok(())
        })?;
    }

    // Custom registrations either validate cleanly or reject; a rejected
    // seed never leaves a strategy behind.
    #[test]
    fn prop_custom_registration_never_clamps(
        floor in 1u64..1_000_000,
        ceiling in 1u64..1_000_000,
        initial in 1u64..1_000_000,
        priority in -0.5f64..1.5
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let engine = StrategyEngine::new(Arc::new(ManualClock::new(0)), u64::MAX);
            let seed = StrategySeed {
                initial_interval_ms: initial,
                floor_ms: floor,
                ceiling_ms: ceiling,
                priority,
                prefetch_enabled: true,
            };

            let valid = floor <= ceiling
                && (floor..=ceiling).contains(&initial)
                && (0.0..=1.0).contains(&priority);
            let result = engine.register_custom("k", StrategyPreset::Adaptive, seed).await;

            prop_assert_eq!(result.is_ok(), valid);
            match engine.get("k").await {
                Some(snapshot) => {
                    // Accepted seeds are stored verbatim, never adjusted
                    prop_assert!(valid);
                    prop_assert_eq!(snapshot.current_interval_ms, initial);
                    prop_assert_eq!(snapshot.floor_ms, floor);
                    prop_assert_eq!(snapshot.ceiling_ms, ceiling);
                }
                None => prop_assert!(!valid),
            }
            Ok(())
        })?;
    }
}

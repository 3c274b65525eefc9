//! Background Sweep Tasks
//!
//! Spawns the engine's long-running loops. Every task returns a
//! JoinHandle so the host can abort it during graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::coordinator::{Coordinator, PrefetchSuggestion};
use crate::evictor::Evictor;
use crate::pressure::PressureState;

// == Pressure Task ==
/// Spawns a task that reacts to pressure notifications from the host.
///
/// The loop exits when the host drops its `watch::Sender`.
pub fn spawn_pressure_task(
    evictor: Arc<Evictor>,
    mut pressure_rx: watch::Receiver<PressureState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("pressure eviction task started");
        loop {
            if pressure_rx.changed().await.is_err() {
                break;
            }
            let state = pressure_rx.borrow_and_update().clone();
            let outcome = evictor.on_pressure(&state).await;
            if outcome.evicted > 0 {
                info!(
                    level = ?state.level,
                    evicted = outcome.evicted,
                    occupancy = outcome.occupancy,
                    "pressure eviction ran"
                );
            } else {
                debug!(level = ?state.level, "pressure notification needed no eviction");
            }
        }
        info!("pressure source dropped, eviction task exiting");
    })
}

// == Prefetch Task ==
/// Spawns a task that emits a ranked prefetch list on a fixed interval.
///
/// Suggestions are sent over `suggestions_tx`; the loop exits once the
/// receiving side is dropped.
pub fn spawn_prefetch_task(
    coordinator: Arc<Coordinator>,
    interval_ms: u64,
    limit: usize,
    suggestions_tx: mpsc::Sender<Vec<PrefetchSuggestion>>,
) -> JoinHandle<()> {
    let interval = Duration::from_millis(interval_ms);
    tokio::spawn(async move {
        info!(interval_ms, limit, "prefetch ranking task started");
        loop {
            tokio::time::sleep(interval).await;
            let suggestions = coordinator.run_prefetch_sweep(limit).await;
            if suggestions.is_empty() {
                debug!("prefetch sweep produced no candidates");
                continue;
            }
            if suggestions_tx.send(suggestions).await.is_err() {
                break;
            }
        }
        info!("prefetch consumer dropped, ranking task exiting");
    })
}

// == Strategy Sweep Task ==
/// Spawns a task that periodically re-analyzes every tracked strategy.
pub fn spawn_strategy_sweep_task(
    coordinator: Arc<Coordinator>,
    interval_ms: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_millis(interval_ms);
    tokio::spawn(async move {
        info!(interval_ms, "strategy sweep task started");
        loop {
            tokio::time::sleep(interval).await;
            let updated = coordinator.run_strategy_sweep().await;
            if updated > 0 {
                debug!(updated, "periodic strategy sweep ran");
            }
        }
    })
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::pressure::PressureLevel;
    use crate::store::{EntryStore, MemoryBackend, StatsRecorder};
    use crate::strategy::{StrategyEngine, StrategyPreset};
    use serde_json::json;

    fn build_parts() -> (Arc<Evictor>, Arc<Coordinator>, EntryStore) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let config = Config {
            max_hot_entries: 10,
            default_ttl_ms: 3_600_000,
            ..Config::default()
        };
        let stats = Arc::new(StatsRecorder::new());
        let strategies = Arc::new(StrategyEngine::new(
            clock.clone(),
            config.strategy_retention_ms,
        ));
        let store = EntryStore::new(
            &config,
            Arc::new(MemoryBackend::new()),
            strategies.clone(),
            stats.clone(),
            clock.clone(),
        );
        let evictor = Arc::new(Evictor::new(
            store.clone(),
            strategies.clone(),
            stats.clone(),
            config.max_hot_entries,
        ));
        let coordinator = Arc::new(Coordinator::new(strategies, stats, clock));
        (evictor, coordinator, store)
    }

    #[tokio::test]
    async fn test_pressure_task_sweeps_on_notification() {
        let (evictor, _, store) = build_parts();
        for i in 0..10 {
            store.put(&format!("k{i}"), json!(i), None).await;
        }

        let (tx, rx) = watch::channel(PressureState::normal());
        let handle = spawn_pressure_task(evictor, rx);

        tx.send(PressureState::new(PressureLevel::High, 0.7))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(store.hot_len().await <= 5);
        drop(tx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished(), "task should exit when host drops");
    }

    #[tokio::test]
    async fn test_prefetch_task_emits_ranked_lists() {
        let (_, coordinator, store) = build_parts();
        store.put("fund:a", json!(1.0), None).await;

        let (tx, mut rx) = mpsc::channel(4);
        let handle = spawn_prefetch_task(coordinator, 20, 8, tx);

        let suggestions = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("prefetch list within two seconds")
            .expect("channel open");
        assert!(!suggestions.is_empty());
        assert_eq!(suggestions[0].key, "fund:a");

        handle.abort();
    }

    #[tokio::test]
    async fn test_prefetch_task_exits_when_consumer_drops() {
        let (_, coordinator, store) = build_parts();
        store.put("fund:a", json!(1.0), None).await;

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = spawn_prefetch_task(coordinator, 10, 8, tx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_strategy_sweep_task_can_be_aborted() {
        let (_, coordinator, _) = build_parts();
        let handle = spawn_strategy_sweep_task(coordinator, 10);

        handle.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished(), "task should be finished after abort");
    }

    #[tokio::test]
    async fn test_strategy_sweep_task_updates_strategies() {
        let clock = Arc::new(ManualClock::new(0));
        let strategies = Arc::new(StrategyEngine::new(clock.clone(), u64::MAX));
        strategies.register("k", StrategyPreset::Balanced).await;
        let coordinator = Arc::new(Coordinator::new(
            strategies.clone(),
            Arc::new(StatsRecorder::new()),
            clock.clone(),
        ));

        let handle = spawn_strategy_sweep_task(coordinator, 20);
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.abort();

        // Still registered and still within bounds after repeated sweeps
        let snapshot = strategies.get("k").await.unwrap();
        assert!(snapshot.current_interval_ms >= snapshot.floor_ms);
        assert!(snapshot.current_interval_ms <= snapshot.ceiling_ms);
    }
}

//! Cache Engine Module
//!
//! Composition root wiring the entry store, refresh strategies, evictor
//! and prefetch coordinator into one handle. Hosts construct a
//! `CacheEngine`, optionally spawn the background loops, and talk to the
//! rest of the crate through it.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::coordinator::{Coordinator, PrefetchSuggestion};
use crate::error::Result;
use crate::evictor::{Evictor, FullCollectionHook, SweepOutcome};
use crate::pressure::PressureState;
use crate::store::{
    CacheEntry, EntryStore, MemoryBackend, PersistenceBackend, StatsRecorder,
};
use crate::strategy::{StrategyEngine, StrategyPreset, StrategySeed, StrategySnapshot};
use crate::tasks::{spawn_prefetch_task, spawn_pressure_task, spawn_strategy_sweep_task};
use crate::Config;

// == Engine Stats ==
/// Point-in-time operational picture of the whole engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub hot_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub expirations: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub backend_degradations: u64,
    pub sweep_errors: u64,
    pub average_age_ms: u64,
    pub tracked_strategies: usize,
    pub preset_distribution: HashMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

// == Engine Tasks ==
/// Handles for the spawned background loops.
pub struct EngineTasks {
    pub pressure: JoinHandle<()>,
    pub prefetch: JoinHandle<()>,
    pub strategy_sweep: JoinHandle<()>,
}

impl EngineTasks {
    /// Aborts every background loop. Used during shutdown.
    pub fn abort_all(&self) {
        self.pressure.abort();
        self.prefetch.abort();
        self.strategy_sweep.abort();
    }
}

// == Cache Engine ==
/// Front door for the adaptive market-data cache.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct CacheEngine {
    config: Config,
    store: EntryStore,
    strategies: Arc<StrategyEngine>,
    stats: Arc<StatsRecorder>,
    evictor: Arc<Evictor>,
    coordinator: Arc<Coordinator>,
}

impl CacheEngine {
    // == Construction ==
    /// Builds an engine on the in-memory backend and the system clock.
    pub fn new(config: Config) -> Self {
        Self::with_parts(
            config,
            Arc::new(MemoryBackend::new()),
            Arc::new(SystemClock),
        )
    }

    /// Builds an engine with a caller-supplied backend and clock.
    pub fn with_parts(
        config: Config,
        backend: Arc<dyn PersistenceBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let stats = Arc::new(StatsRecorder::new());
        let strategies = Arc::new(StrategyEngine::new(
            clock.clone(),
            config.strategy_retention_ms,
        ));
        let store = EntryStore::new(
            &config,
            backend,
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
        let coordinator = Arc::new(Coordinator::new(
            strategies.clone(),
            stats.clone(),
            clock,
        ));
        info!(
            max_hot_entries = config.max_hot_entries,
            default_ttl_ms = config.default_ttl_ms,
            "cache engine ready"
        );
        Self {
            config,
            store,
            strategies,
            stats,
            evictor,
            coordinator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // == Entry Operations ==
    /// Retrieves an entry, updating access metadata. `None` means absent
    /// or expired.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.store.get(key).await
    }

    /// Writes a value with the default TTL. Returns the replaced payload.
    pub async fn put(&self, key: &str, value: Value) -> Option<Value> {
        self.store.put(key, value, None).await
    }

    /// Writes a value with an explicit TTL.
    pub async fn put_with_ttl(&self, key: &str, value: Value, ttl_ms: u64) -> Option<Value> {
        self.store.put(key, value, Some(ttl_ms)).await
    }

    /// Removes a key from both tiers.
    pub async fn remove(&self, key: &str) -> bool {
        self.store.remove(key).await
    }

    /// Drops every entry from both tiers.
    pub async fn clear(&self) {
        self.store.clear().await;
    }

    /// Read-through load with the default TTL: fresh values return
    /// directly, stale values return while a background refresh runs, and
    /// misses invoke `loader` once no matter how many callers race.
    pub async fn get_or_load<F, Fut>(&self, key: &str, loader: F) -> Result<Value>
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.store.get_or_load(key, None, loader).await
    }

    /// Read-through load with an explicit TTL for the loaded value.
    pub async fn get_or_load_with_ttl<F, Fut>(
        &self,
        key: &str,
        ttl_ms: u64,
        loader: F,
    ) -> Result<Value>
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.store.get_or_load(key, Some(ttl_ms), loader).await
    }

    // == Strategy Operations ==
    /// Registers `key` under one of the built-in presets.
    pub async fn register_strategy(&self, key: &str, preset: StrategyPreset) -> StrategySnapshot {
        self.strategies.register(key, preset).await
    }

    /// Registers `key` with caller-supplied bounds; invalid bounds are
    /// rejected, never clamped.
    pub async fn register_strategy_with(
        &self,
        key: &str,
        preset: StrategyPreset,
        seed: StrategySeed,
    ) -> Result<StrategySnapshot> {
        self.strategies.register_custom(key, preset, seed).await
    }

    pub async fn strategy(&self, key: &str) -> Option<StrategySnapshot> {
        self.strategies.get(key).await
    }

    /// Explicit interval override: `increase = true` refreshes more
    /// often. Returns the new interval in milliseconds.
    pub async fn adjust_frequency(&self, key: &str, increase: bool) -> Result<u64> {
        self.strategies.adjust_frequency(key, increase).await
    }

    /// Next recommended refresh time for `key`, as Unix milliseconds.
    pub async fn recommended_update_time(&self, key: &str) -> Result<u64> {
        self.strategies.recommended_update_time(key).await
    }

    /// Re-runs adaptive analysis across the given keys in one pass.
    pub async fn batch_update_strategies(&self, keys: &[String]) -> usize {
        self.coordinator.batch_update_strategies(keys).await
    }

    // == Prefetch ==
    /// Bounded, ranked list of keys worth refreshing ahead of demand.
    pub async fn prefetch_suggestions(&self, limit: usize) -> Vec<PrefetchSuggestion> {
        self.coordinator.prefetch_suggestions(limit).await
    }

    // == Pressure ==
    /// Reacts to one host pressure notification immediately, without
    /// going through the background task.
    pub async fn on_pressure(&self, state: &PressureState) -> SweepOutcome {
        self.evictor.on_pressure(state).await
    }

    /// Installs the host callback invoked on critical pressure.
    pub fn set_full_collection_hook(&self, hook: FullCollectionHook) {
        self.evictor.set_full_collection_hook(hook);
    }

    // == Background Tasks ==
    /// Spawns the pressure, prefetch and strategy-sweep loops.
    ///
    /// Prefetch suggestion lists go out over `suggestions_tx`; pressure
    /// notifications come in over `pressure_rx`.
    pub fn spawn_background(
        &self,
        pressure_rx: watch::Receiver<PressureState>,
        suggestions_tx: mpsc::Sender<Vec<PrefetchSuggestion>>,
    ) -> EngineTasks {
        EngineTasks {
            pressure: spawn_pressure_task(self.evictor.clone(), pressure_rx),
            prefetch: spawn_prefetch_task(
                self.coordinator.clone(),
                self.config.prefetch_interval_ms,
                self.config.prefetch_limit,
                suggestions_tx,
            ),
            strategy_sweep: spawn_strategy_sweep_task(
                self.coordinator.clone(),
                self.config.strategy_sweep_interval_ms,
            ),
        }
    }

    // == Stats ==
    /// Operational snapshot across all components.
    pub async fn stats(&self) -> EngineStats {
        let counters = self.stats.snapshot();
        EngineStats {
            hot_entries: self.store.hot_len().await,
            hits: counters.hits,
            misses: counters.misses,
            hit_rate: counters.hit_rate(),
            evictions: counters.evictions,
            expirations: counters.expirations,
            loads: counters.loads,
            load_failures: counters.load_failures,
            backend_degradations: counters.backend_degradations,
            sweep_errors: counters.sweep_errors,
            average_age_ms: self.store.average_age_ms().await,
            tracked_strategies: self.strategies.len().await,
            preset_distribution: self.strategies.preset_distribution().await,
            generated_at: Utc::now(),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn engine_with_clock() -> (CacheEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let engine = CacheEngine::with_parts(
            Config::default(),
            Arc::new(MemoryBackend::new()),
            clock.clone(),
        );
        (engine, clock)
    }

    #[tokio::test]
    async fn test_round_trip_through_engine() {
        let (engine, _) = engine_with_clock();

        engine.put("fund:F001", json!({"nav": 12.5})).await;
        let entry = engine.get("fund:F001").await.unwrap();
        assert_eq!(entry.value["nav"], json!(12.5));
    }

    #[tokio::test]
    async fn test_stats_reflect_traffic() {
        let (engine, _) = engine_with_clock();

        engine.put("a", json!(1)).await;
        let _ = engine.get("a").await;
        let _ = engine.get("missing").await;

        let stats = engine.stats().await;
        assert_eq!(stats.hot_entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        // The write registered an implicit adaptive strategy
        assert_eq!(stats.tracked_strategies, 1);
        assert_eq!(stats.preset_distribution.get("adaptive"), Some(&1));
    }

    #[tokio::test]
    async fn test_strategy_surface_delegates() {
        let (engine, _) = engine_with_clock();

        let snapshot = engine
            .register_strategy("fund:F001", StrategyPreset::HighFrequency)
            .await;
        assert_eq!(snapshot.current_interval_ms, 60_000);

        let widened = engine.adjust_frequency("fund:F001", false).await.unwrap();
        assert_eq!(widened, 84_000);

        let at = engine.recommended_update_time("fund:F001").await.unwrap();
        assert_eq!(at, 1_000_000 + 84_000);
    }

    #[tokio::test]
    async fn test_background_tasks_spawn_and_abort() {
        let (engine, _) = engine_with_clock();
        let (_pressure_tx, pressure_rx) = watch::channel(PressureState::normal());
        let (suggestions_tx, _suggestions_rx) = mpsc::channel(4);

        let tasks = engine.spawn_background(pressure_rx, suggestions_tx);
        tasks.abort_all();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(tasks.prefetch.is_finished());
        assert!(tasks.strategy_sweep.is_finished());
    }
}

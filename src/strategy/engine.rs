//! Adaptive Refresh Strategy Module
//!
//! One policy object per tracked key, tuning the refresh interval inside
//! `[floor, ceiling]` from observed volatility and access frequency. The
//! engine owns all strategy state and exposes only read-only snapshots.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::Clock;
use crate::error::{CacheError, Result};
use crate::strategy::{StrategyPreset, StrategySeed};

// == Tuning Constants ==
/// Maximum access timestamps retained per key.
const MAX_ACCESS_SAMPLES: usize = 50;
/// Interval multiplier when refreshing more often.
const NARROW_FACTOR: f64 = 0.7;
/// Interval multiplier when refreshing less often.
const WIDEN_FACTOR: f64 = 1.4;
/// EWMA weight given to the newest change observation.
const VOLATILITY_ALPHA: f64 = 0.3;
/// Change magnitude assigned to a non-numeric payload that changed.
const NON_NUMERIC_CHANGE: f64 = 0.25;
/// Volatility above which the interval narrows.
const HIGH_VOLATILITY: f64 = 0.5;
/// Volatility below which the interval widens.
const LOW_VOLATILITY: f64 = 0.05;
/// Writes observed before volatility is trusted as a signal.
const MIN_WRITES_FOR_VOLATILITY: u64 = 3;
/// Window over which accesses count towards the hot-key check.
const HOT_WINDOW_MS: u64 = 600_000;
/// Accesses within the hot window that mark a key hot.
const HOT_ACCESS_THRESHOLD: usize = 12;
/// A key unaccessed beyond this many intervals is idle.
const IDLE_INTERVAL_MULTIPLIER: u64 = 3;
/// Priority assumed for keys without a registered strategy.
pub const DEFAULT_UNTRACKED_PRIORITY: f64 = 0.5;

// == Refresh Strategy ==
/// Mutable per-key policy state. Never leaves the engine; readers get
/// `StrategySnapshot` copies.
#[derive(Debug)]
struct RefreshStrategy {
    key: String,
    preset: StrategyPreset,
    current_interval_ms: u64,
    floor_ms: u64,
    ceiling_ms: u64,
    priority: f64,
    prefetch_enabled: bool,
    recent_accesses: VecDeque<u64>,
    volatility: f64,
    writes_observed: u64,
    last_written_at: Option<u64>,
    registered_at: u64,
}

impl RefreshStrategy {
    fn from_seed(key: String, preset: StrategyPreset, seed: StrategySeed, now: u64) -> Self {
        Self {
            key,
            preset,
            current_interval_ms: seed.initial_interval_ms,
            floor_ms: seed.floor_ms,
            ceiling_ms: seed.ceiling_ms,
            priority: seed.priority,
            prefetch_enabled: seed.prefetch_enabled,
            recent_accesses: VecDeque::with_capacity(MAX_ACCESS_SAMPLES),
            volatility: 0.0,
            writes_observed: 0,
            last_written_at: None,
            registered_at: now,
        }
    }

    fn record_access(&mut self, now: u64) {
        if self.recent_accesses.len() == MAX_ACCESS_SAMPLES {
            self.recent_accesses.pop_front();
        }
        self.recent_accesses.push_back(now);
    }

    fn last_accessed_at(&self) -> Option<u64> {
        self.recent_accesses.back().copied()
    }

    fn accesses_since(&self, cutoff: u64) -> usize {
        self.recent_accesses.iter().filter(|t| **t >= cutoff).count()
    }

    /// Applies a damping factor, clamped to `[floor, ceiling]`. The clamp
    /// is what keeps the bounds invariant under any adjustment sequence.
    fn apply_factor(&mut self, factor: f64) {
        let next = (self.current_interval_ms as f64 * factor).round() as u64;
        self.current_interval_ms = next.clamp(self.floor_ms, self.ceiling_ms);
    }

    fn observe_change(&mut self, magnitude: f64) {
        self.volatility = VOLATILITY_ALPHA * magnitude + (1.0 - VOLATILITY_ALPHA) * self.volatility;
        self.writes_observed += 1;
    }

    /// Re-examines access frequency and volatility and moves the interval
    /// accordingly. Hot keys narrow; idle keys widen. Volatility only
    /// contributes once enough writes have been observed.
    fn analyze(&mut self, now: u64) {
        let volatility_trusted = self.writes_observed >= MIN_WRITES_FOR_VOLATILITY;
        let hot =
            self.accesses_since(now.saturating_sub(HOT_WINDOW_MS)) >= HOT_ACCESS_THRESHOLD;
        let idle = self
            .last_accessed_at()
            .map_or(false, |t| {
                now.saturating_sub(t) > IDLE_INTERVAL_MULTIPLIER * self.current_interval_ms
            });

        if hot || (volatility_trusted && self.volatility > HIGH_VOLATILITY) {
            self.apply_factor(NARROW_FACTOR);
        } else if idle || (volatility_trusted && self.volatility < LOW_VOLATILITY) {
            self.apply_factor(WIDEN_FACTOR);
        }
    }

    fn last_activity(&self) -> u64 {
        self.last_accessed_at()
            .into_iter()
            .chain(self.last_written_at)
            .chain(std::iter::once(self.registered_at))
            .max()
            .unwrap_or(self.registered_at)
    }

    fn snapshot(&self) -> StrategySnapshot {
        StrategySnapshot {
            key: self.key.clone(),
            preset: self.preset,
            current_interval_ms: self.current_interval_ms,
            floor_ms: self.floor_ms,
            ceiling_ms: self.ceiling_ms,
            priority: self.priority,
            prefetch_enabled: self.prefetch_enabled,
            volatility: self.volatility,
            recent_access_count: self.recent_accesses.len(),
            last_accessed_at: self.last_accessed_at(),
            last_written_at: self.last_written_at,
        }
    }
}

// == Strategy Snapshot ==
/// Read-only copy of a strategy's state.
#[derive(Debug, Clone, Serialize)]
pub struct StrategySnapshot {
    pub key: String,
    pub preset: StrategyPreset,
    pub current_interval_ms: u64,
    pub floor_ms: u64,
    pub ceiling_ms: u64,
    pub priority: f64,
    pub prefetch_enabled: bool,
    pub volatility: f64,
    pub recent_access_count: usize,
    pub last_accessed_at: Option<u64>,
    pub last_written_at: Option<u64>,
}

// == Strategy Engine ==
/// Owns every per-key strategy; all external reads go through snapshots.
#[derive(Debug)]
pub struct StrategyEngine {
    strategies: RwLock<HashMap<String, RefreshStrategy>>,
    clock: Arc<dyn Clock>,
    retention_ms: u64,
}

impl StrategyEngine {
    pub fn new(clock: Arc<dyn Clock>, retention_ms: u64) -> Self {
        Self {
            strategies: RwLock::new(HashMap::new()),
            clock,
            retention_ms,
        }
    }

    // == Register ==
    /// Registers (or re-seeds) a strategy from a preset.
    pub async fn register(&self, key: &str, preset: StrategyPreset) -> StrategySnapshot {
        let now = self.clock.now_ms();
        let strategy = RefreshStrategy::from_seed(key.to_string(), preset, preset.seed(), now);
        let snapshot = strategy.snapshot();
        self.strategies
            .write()
            .await
            .insert(key.to_string(), strategy);
        snapshot
    }

    /// Registers a strategy with caller-supplied bounds.
    ///
    /// Invalid bounds are rejected outright, never silently clamped.
    pub async fn register_custom(
        &self,
        key: &str,
        preset: StrategyPreset,
        seed: StrategySeed,
    ) -> Result<StrategySnapshot> {
        validate_seed(key, &seed)?;
        let now = self.clock.now_ms();
        let strategy = RefreshStrategy::from_seed(key.to_string(), preset, seed, now);
        let snapshot = strategy.snapshot();
        self.strategies
            .write()
            .await
            .insert(key.to_string(), strategy);
        Ok(snapshot)
    }

    // == Observations ==
    /// Records a read of `key`, registering it under the Adaptive preset
    /// if it was not yet tracked.
    pub async fn record_access(&self, key: &str) {
        let now = self.clock.now_ms();
        let mut strategies = self.strategies.write().await;
        let strategy = strategies.entry(key.to_string()).or_insert_with(|| {
            RefreshStrategy::from_seed(
                key.to_string(),
                StrategyPreset::Adaptive,
                StrategyPreset::Adaptive.seed(),
                now,
            )
        });
        strategy.record_access(now);
    }

    /// Records a write of `key`, folding the value-change magnitude into
    /// the volatility estimate and re-analyzing the interval.
    pub async fn record_write(&self, key: &str, previous: Option<&Value>, next: &Value) {
        let now = self.clock.now_ms();
        let magnitude = change_magnitude(previous, next);
        let mut strategies = self.strategies.write().await;
        let strategy = strategies.entry(key.to_string()).or_insert_with(|| {
            RefreshStrategy::from_seed(
                key.to_string(),
                StrategyPreset::Adaptive,
                StrategyPreset::Adaptive.seed(),
                now,
            )
        });
        strategy.observe_change(magnitude);
        strategy.last_written_at = Some(now);
        strategy.analyze(now);
    }

    // == Adjust Frequency ==
    /// Explicit interval override: `increase = true` refreshes more often
    /// (interval × 0.7), `false` less often (× 1.4). Returns the new
    /// interval in milliseconds.
    pub async fn adjust_frequency(&self, key: &str, increase: bool) -> Result<u64> {
        let mut strategies = self.strategies.write().await;
        let strategy = strategies
            .get_mut(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        let factor = if increase { NARROW_FACTOR } else { WIDEN_FACTOR };
        strategy.apply_factor(factor);
        Ok(strategy.current_interval_ms)
    }

    // == Analyze ==
    /// Re-runs the adaptive analysis for one key.
    pub async fn analyze_and_update(&self, key: &str) -> Result<()> {
        let now = self.clock.now_ms();
        let mut strategies = self.strategies.write().await;
        let strategy = strategies
            .get_mut(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        strategy.analyze(now);
        Ok(())
    }

    /// Pure query: the next recommended refresh time for `key`.
    pub async fn recommended_update_time(&self, key: &str) -> Result<u64> {
        let now = self.clock.now_ms();
        let strategies = self.strategies.read().await;
        let strategy = strategies
            .get(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        Ok(now + strategy.current_interval_ms)
    }

    // == Snapshots ==
    pub async fn get(&self, key: &str) -> Option<StrategySnapshot> {
        self.strategies.read().await.get(key).map(|s| s.snapshot())
    }

    pub async fn snapshots(&self) -> Vec<StrategySnapshot> {
        self.strategies
            .read()
            .await
            .values()
            .map(|s| s.snapshot())
            .collect()
    }

    pub async fn tracked_keys(&self) -> Vec<String> {
        self.strategies.read().await.keys().cloned().collect()
    }

    /// Priorities for every tracked key; eviction tie-breaking assumes
    /// `DEFAULT_UNTRACKED_PRIORITY` for the rest.
    pub async fn priorities(&self) -> HashMap<String, f64> {
        self.strategies
            .read()
            .await
            .iter()
            .map(|(k, s)| (k.clone(), s.priority))
            .collect()
    }

    pub async fn preset_distribution(&self) -> HashMap<String, usize> {
        let mut distribution: HashMap<String, usize> = HashMap::new();
        for strategy in self.strategies.read().await.values() {
            *distribution
                .entry(strategy.preset.name().to_string())
                .or_default() += 1;
        }
        distribution
    }

    pub async fn len(&self) -> usize {
        self.strategies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.strategies.read().await.is_empty()
    }

    // == Batch Update ==
    /// Re-analyzes many keys in one pass and opportunistically drops
    /// strategies untouched beyond the retention window. Returns the
    /// number of strategies updated.
    pub async fn batch_update(&self, keys: &[String]) -> usize {
        let now = self.clock.now_ms();
        let cutoff = now.saturating_sub(self.retention_ms);
        let mut strategies = self.strategies.write().await;

        let mut updated = 0;
        for key in keys {
            if let Some(strategy) = strategies.get_mut(key) {
                strategy.analyze(now);
                updated += 1;
            }
        }

        let before = strategies.len();
        strategies.retain(|_, s| s.last_activity() >= cutoff);
        let collected = before - strategies.len();
        if collected > 0 {
            debug!(collected, "dropped strategies past the retention window");
        }

        updated
    }
}

/// Relative change between consecutive payloads, in `[0, 1]`.
///
/// Numeric payloads use the relative delta; non-numeric payloads
/// contribute a fixed constant when they changed at all.
fn change_magnitude(previous: Option<&Value>, next: &Value) -> f64 {
    let Some(previous) = previous else {
        return 0.0;
    };
    match (previous.as_f64(), next.as_f64()) {
        (Some(a), Some(b)) => {
            let denom = a.abs().max(1e-9);
            ((b - a).abs() / denom).min(1.0)
        }
        _ => {
            if previous == next {
                0.0
            } else {
                NON_NUMERIC_CHANGE
            }
        }
    }
}

// == Seed Validation ==
fn validate_seed(key: &str, seed: &StrategySeed) -> Result<()> {
    let reject = |reason: &str| {
        Err(CacheError::InvalidStrategyBounds {
            key: key.to_string(),
            reason: reason.to_string(),
        })
    };
    if seed.floor_ms == 0 {
        return reject("floor must be positive");
    }
    if seed.floor_ms > seed.ceiling_ms {
        return reject("floor exceeds ceiling");
    }
    if seed.initial_interval_ms < seed.floor_ms || seed.initial_interval_ms > seed.ceiling_ms {
        return reject("initial interval outside [floor, ceiling]");
    }
    if !seed.priority.is_finite() || !(0.0..=1.0).contains(&seed.priority) {
        return reject("priority outside [0, 1]");
    }
    Ok(())
}

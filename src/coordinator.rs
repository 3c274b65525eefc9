//! Prefetch & Strategy Sweep Coordinator Module
//!
//! Ranks keys for bounded prefetch lists and drives the periodic batch
//! strategy analysis. Sweeps score point-in-time snapshots so unrelated
//! readers are never blocked, and re-entrant triggers coalesce.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::store::StatsRecorder;
use crate::strategy::{StrategyEngine, StrategySnapshot};

// == Scoring Constants ==
/// Weight of the strategy priority in the prefetch score.
const WEIGHT_PRIORITY: f64 = 0.5;
/// Weight of normalized staleness.
const WEIGHT_STALENESS: f64 = 0.35;
/// Weight of access recency.
const WEIGHT_RECENCY: f64 = 0.15;
/// Staleness is capped at this many refresh intervals.
const STALENESS_CAP: f64 = 2.0;
/// Window over which an access still counts as recent.
const RECENCY_WINDOW_MS: u64 = 3_600_000;

// == Prefetch Suggestion ==
/// One ranked prefetch candidate.
#[derive(Debug, Clone, Serialize)]
pub struct PrefetchSuggestion {
    pub key: String,
    pub score: f64,
}

// == Sweep Guard ==
/// Holds a sweep's coalescing flag and clears it on drop, so a sweep
/// cancelled mid-flight cannot wedge every later sweep of its kind.
pub(crate) struct SweepGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SweepGuard<'a> {
    /// Claims the flag. `None` means another sweep is already running.
    pub(crate) fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// == Coordinator ==
#[derive(Debug)]
pub struct Coordinator {
    strategies: Arc<StrategyEngine>,
    stats: Arc<StatsRecorder>,
    clock: Arc<dyn Clock>,
    prefetch_sweeping: AtomicBool,
    strategy_sweeping: AtomicBool,
}

impl Coordinator {
    pub fn new(
        strategies: Arc<StrategyEngine>,
        stats: Arc<StatsRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            strategies,
            stats,
            clock,
            prefetch_sweeping: AtomicBool::new(false),
            strategy_sweeping: AtomicBool::new(false),
        }
    }

    // == Prefetch Suggestions ==
    /// Ranks prefetch-enabled keys by priority, normalized staleness and
    /// access recency; ties fall back to lexical key order so the list
    /// is deterministic.
    pub async fn prefetch_suggestions(&self, limit: usize) -> Vec<PrefetchSuggestion> {
        let now = self.clock.now_ms();
        let mut suggestions: Vec<PrefetchSuggestion> = self
            .strategies
            .snapshots()
            .await
            .into_iter()
            .filter(|s| s.prefetch_enabled)
            .map(|s| PrefetchSuggestion {
                score: score(&s, now),
                key: s.key,
            })
            .collect();

        suggestions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        suggestions.truncate(limit);
        suggestions
    }

    /// Periodic sweep entry point: coalesces re-entrant triggers and
    /// never lets a failure escape to the scheduler.
    pub async fn run_prefetch_sweep(&self, limit: usize) -> Vec<PrefetchSuggestion> {
        let Some(_guard) = SweepGuard::claim(&self.prefetch_sweeping) else {
            debug!("prefetch sweep already running, coalescing");
            return Vec::new();
        };
        let suggestions = self.prefetch_suggestions(limit).await;
        debug!(candidates = suggestions.len(), "prefetch sweep complete");
        suggestions
    }

    // == Batch Strategy Update ==
    /// Re-runs adaptive analysis across the given keys in one pass.
    /// Returns the number of strategies updated.
    pub async fn batch_update_strategies(&self, keys: &[String]) -> usize {
        self.strategies.batch_update(keys).await
    }

    /// Periodic sweep over every tracked key. Coalesces re-entrant
    /// triggers; a sweep that cannot run is counted, never raised.
    pub async fn run_strategy_sweep(&self) -> usize {
        let Some(_guard) = SweepGuard::claim(&self.strategy_sweeping) else {
            debug!("strategy sweep already running, coalescing");
            return 0;
        };
        let keys = self.strategies.tracked_keys().await;
        let updated = self.batch_update_strategies(&keys).await;

        if updated < keys.len() {
            // Keys collected mid-sweep are picked up next cycle
            let missing = keys.len() - updated;
            self.stats.record_sweep_error();
            warn!(missing, "strategy sweep skipped keys that vanished mid-pass");
        }
        debug!(updated, "strategy sweep complete");
        updated
    }
}

/// Composite prefetch score in [0, 1].
fn score(snapshot: &StrategySnapshot, now: u64) -> f64 {
    let staleness = match snapshot.last_written_at {
        Some(written) => {
            let intervals = now.saturating_sub(written) as f64
                / snapshot.current_interval_ms.max(1) as f64;
            intervals.min(STALENESS_CAP) / STALENESS_CAP
        }
        // Never written at all: maximally urgent
        None => 1.0,
    };
    let recency = snapshot.last_accessed_at.map_or(0.0, |accessed| {
        1.0 - (now.saturating_sub(accessed) as f64 / RECENCY_WINDOW_MS as f64).min(1.0)
    });
    WEIGHT_PRIORITY * snapshot.priority + WEIGHT_STALENESS * staleness + WEIGHT_RECENCY * recency
}

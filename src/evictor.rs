//! Pressure-Driven Evictor Module
//!
//! Reduces the in-process tier to a per-level occupancy target when the
//! host reports memory pressure. Eviction order is strict LRU by access
//! time, with ties broken by lower strategy priority, then key order.
//! The persisted tier is never touched, so an evicted key stays
//! retrievable at higher latency until it separately expires.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::coordinator::SweepGuard;
use crate::pressure::{PressureLevel, PressureState};
use crate::store::{EntryStore, StatsRecorder};
use crate::strategy::{StrategyEngine, DEFAULT_UNTRACKED_PRIORITY};

/// Host callback invoked when critical pressure asks for a full
/// collection pass.
pub type FullCollectionHook = Arc<dyn Fn() + Send + Sync>;

// == Sweep Outcome ==
/// Result of reacting to one pressure notification.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepOutcome {
    /// Entries removed from the hot tier this sweep
    pub evicted: usize,
    /// Hot-tier occupancy after the sweep
    pub occupancy: usize,
    /// Whether the host was asked for a full collection pass
    pub full_collection_requested: bool,
    /// True when the trigger arrived while another sweep was running
    pub coalesced: bool,
}

// == Evictor ==
pub struct Evictor {
    store: EntryStore,
    strategies: Arc<StrategyEngine>,
    stats: Arc<StatsRecorder>,
    capacity: usize,
    sweeping: AtomicBool,
    full_collection_hook: RwLock<Option<FullCollectionHook>>,
}

// The collection hook is an opaque closure with no Debug impl
impl fmt::Debug for Evictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evictor")
            .field("store", &self.store)
            .field("capacity", &self.capacity)
            .field("sweeping", &self.sweeping)
            .finish_non_exhaustive()
    }
}

impl Evictor {
    pub fn new(
        store: EntryStore,
        strategies: Arc<StrategyEngine>,
        stats: Arc<StatsRecorder>,
        capacity: usize,
    ) -> Self {
        Self {
            store,
            strategies,
            stats,
            capacity,
            sweeping: AtomicBool::new(false),
            full_collection_hook: RwLock::new(None),
        }
    }

    /// Installs the host callback for critical-pressure collection requests.
    pub fn set_full_collection_hook(&self, hook: FullCollectionHook) {
        if let Ok(mut slot) = self.full_collection_hook.write() {
            *slot = Some(hook);
        }
    }

    // == On Pressure ==
    /// Reacts to one pressure notification. Normal pressure is a no-op;
    /// other levels sweep down to their occupancy target. Triggers
    /// arriving mid-sweep coalesce into a no-op rather than queue.
    pub async fn on_pressure(&self, state: &PressureState) -> SweepOutcome {
        let Some(target_fraction) = state.level.occupancy_target() else {
            return SweepOutcome {
                occupancy: self.store.hot_len().await,
                ..SweepOutcome::default()
            };
        };

        let Some(_guard) = SweepGuard::claim(&self.sweeping) else {
            debug!(level = ?state.level, "eviction sweep already running, coalescing");
            return SweepOutcome {
                occupancy: self.store.hot_len().await,
                coalesced: true,
                ..SweepOutcome::default()
            };
        };

        let target = (self.capacity as f64 * target_fraction).floor() as usize;
        let evicted = self.sweep_to(target).await;

        let occupancy = self.store.hot_len().await;
        if evicted > 0 {
            info!(level = ?state.level, evicted, occupancy, target, "pressure sweep complete");
        } else {
            debug!(level = ?state.level, occupancy, target, "pressure sweep found full headroom");
        }

        let full_collection_requested = state.level == PressureLevel::Critical;
        if full_collection_requested {
            warn!("critical memory pressure, requesting host collection pass");
            let hook = self
                .full_collection_hook
                .read()
                .ok()
                .and_then(|slot| slot.clone());
            if let Some(hook) = hook {
                hook();
            }
        }

        SweepOutcome {
            evicted,
            occupancy,
            full_collection_requested,
            coalesced: false,
        }
    }

    // == Sweep ==
    /// Evicts hot-tier entries until occupancy drops to `target`.
    ///
    /// Scoring happens on a point-in-time snapshot outside the tier lock.
    /// A key whose persisted copy cannot be confirmed is skipped rather
    /// than lost; such failures are counted, never raised.
    async fn sweep_to(&self, target: usize) -> usize {
        let mut ranked = self.store.access_snapshot().await;
        if ranked.len() <= target {
            return 0;
        }
        let excess = ranked.len() - target;

        let priorities = self.strategies.priorities().await;
        ranked.sort_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| {
                    let pa = priorities
                        .get(&a.0)
                        .copied()
                        .unwrap_or(DEFAULT_UNTRACKED_PRIORITY);
                    let pb = priorities
                        .get(&b.0)
                        .copied()
                        .unwrap_or(DEFAULT_UNTRACKED_PRIORITY);
                    pa.partial_cmp(&pb).unwrap_or(CmpOrdering::Equal)
                })
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut doomed = Vec::with_capacity(excess);
        let mut skipped = 0usize;
        for (key, _) in &ranked {
            if doomed.len() == excess {
                break;
            }
            match self.store.ensure_persisted(key).await {
                Ok(_) => doomed.push(key.clone()),
                Err(err) => {
                    skipped += 1;
                    warn!(key = %key, error = %err, "skipping eviction, persisted copy unavailable");
                }
            }
        }
        if skipped > 0 {
            self.stats.record_sweep_error();
        }

        self.store.evict_keys(&doomed).await
    }
}

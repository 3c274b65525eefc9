//! Entry Store Module
//!
//! Two-tier key/value table: a bounded in-process LRU tier for hot entries
//! and an unbounded persisted tier behind `PersistenceBackend`. Loads go
//! through a per-key in-flight registry so concurrent callers for the same
//! missing or stale key converge on a single loader execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::store::{
    CacheEntry, ExpirationPolicy, Freshness, PersistenceBackend, RecencyLedger, StatsRecorder,
};
use crate::strategy::StrategyEngine;

// == Load Outcome ==
/// Result of one loader execution, cloned to every waiting caller.
#[derive(Debug, Clone)]
enum LoadOutcome {
    Loaded(Value),
    Failed(String),
}

type LoadSlot = Option<LoadOutcome>;

// == Hot Tier ==
#[derive(Debug, Default)]
struct HotTier {
    entries: HashMap<String, CacheEntry>,
    recency: RecencyLedger,
}

#[derive(Debug)]
struct StoreInner {
    hot: RwLock<HotTier>,
    backend: Arc<dyn PersistenceBackend>,
    /// Per-key pending load slots; the receiver resolves once the leader
    /// publishes its outcome.
    inflight: Mutex<HashMap<String, watch::Receiver<LoadSlot>>>,
    policy: ExpirationPolicy,
    strategies: Arc<StrategyEngine>,
    stats: Arc<StatsRecorder>,
    clock: Arc<dyn Clock>,
    max_hot_entries: usize,
    default_ttl_ms: u64,
}

// == Entry Store ==
/// Two-tier entry store with LRU ordering on the in-process tier.
///
/// Cheap to clone; all clones share the same tiers.
#[derive(Debug, Clone)]
pub struct EntryStore {
    inner: Arc<StoreInner>,
}

impl EntryStore {
    // == Constructor ==
    pub fn new(
        config: &Config,
        backend: Arc<dyn PersistenceBackend>,
        strategies: Arc<StrategyEngine>,
        stats: Arc<StatsRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                hot: RwLock::new(HotTier::default()),
                backend,
                inflight: Mutex::new(HashMap::new()),
                policy: ExpirationPolicy::new(config.stale_grace),
                strategies,
                stats,
                clock,
                max_hot_entries: config.max_hot_entries,
                default_ttl_ms: config.default_ttl_ms,
            }),
        }
    }

    pub fn policy(&self) -> ExpirationPolicy {
        self.inner.policy
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    // == Get ==
    /// Retrieves an entry by key, checking the hot tier first and then
    /// the persisted tier (promoting hits back into the hot tier).
    ///
    /// Updates the access time and LRU order regardless of tier. Expired
    /// entries are lazily removed from both tiers. Absence is a return
    /// value, never an error.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.inner.clock.now_ms();

        enum HotLookup {
            Hit(CacheEntry),
            Expired,
            Miss,
        }

        let lookup = {
            let mut hot = self.inner.hot.write().await;
            let tier = &mut *hot;
            match tier.entries.get(key).map(|e| self.inner.policy.classify(e, now)) {
                None => HotLookup::Miss,
                Some(Freshness::Expired) => {
                    tier.entries.remove(key);
                    tier.recency.remove(key);
                    HotLookup::Expired
                }
                Some(_) => {
                    let snapshot = tier.entries.get_mut(key).map(|entry| {
                        entry.touch(now);
                        entry.clone()
                    });
                    tier.recency.touch(key);
                    match snapshot {
                        Some(entry) => HotLookup::Hit(entry),
                        None => HotLookup::Miss,
                    }
                }
            }
        };

        match lookup {
            HotLookup::Hit(entry) => {
                self.inner.stats.record_hit();
                self.inner.strategies.record_access(key).await;
                Some(entry)
            }
            HotLookup::Expired => {
                self.inner.stats.record_expiration();
                if let Err(err) = self.inner.backend.delete(key) {
                    self.degrade("delete", key, &err);
                }
                self.inner.stats.record_miss();
                None
            }
            HotLookup::Miss => self.get_from_backend(key, now).await,
        }
    }

    /// Persisted-tier lookup for keys absent from the hot tier.
    async fn get_from_backend(&self, key: &str, now: u64) -> Option<CacheEntry> {
        let entry = match self.inner.backend.get(key) {
            Ok(entry) => entry,
            Err(err) => {
                self.degrade("get", key, &err);
                self.inner.stats.record_miss();
                return None;
            }
        };
        let Some(mut entry) = entry else {
            self.inner.stats.record_miss();
            return None;
        };

        if self.inner.policy.classify(&entry, now) == Freshness::Expired {
            if let Err(err) = self.inner.backend.delete(key) {
                self.degrade("delete", key, &err);
            }
            self.inner.stats.record_expiration();
            self.inner.stats.record_miss();
            return None;
        }

        entry.touch(now);
        {
            let mut hot = self.inner.hot.write().await;
            Self::insert_hot(
                &mut hot,
                entry.clone(),
                self.inner.max_hot_entries,
                &self.inner.stats,
            );
        }
        // Keep the persisted copy's access time in step with the promotion
        if let Err(err) = self.inner.backend.put(&entry) {
            self.degrade("put", key, &err);
        }

        self.inner.stats.record_hit();
        self.inner.strategies.record_access(key).await;
        Some(entry)
    }

    // == Put ==
    /// Writes a value to both tiers, continuing the key's version
    /// sequence from whichever tier last held it. Returns the replaced
    /// payload, if any.
    pub async fn put(&self, key: &str, value: Value, ttl_ms: Option<u64>) -> Option<Value> {
        let now = self.inner.clock.now_ms();
        let ttl = ttl_ms.unwrap_or(self.inner.default_ttl_ms);

        let (entry, previous_value) = {
            let mut hot = self.inner.hot.write().await;
            // The predecessor lookup happens under the write lock: a racing
            // write to the same key must observe this write's version
            let predecessor = match hot.entries.get(key).cloned() {
                Some(prev) => Some(prev),
                None => match self.inner.backend.get(key) {
                    Ok(persisted) => persisted,
                    Err(err) => {
                        self.degrade("get", key, &err);
                        None
                    }
                },
            };
            let (entry, previous_value) = match predecessor {
                Some(prev) => {
                    let value_before = prev.value.clone();
                    (
                        CacheEntry::refreshed(&prev, value, ttl, now),
                        Some(value_before),
                    )
                }
                None => (CacheEntry::new(key.to_string(), value, ttl, now), None),
            };
            Self::insert_hot(
                &mut hot,
                entry.clone(),
                self.inner.max_hot_entries,
                &self.inner.stats,
            );
            (entry, previous_value)
        };

        if let Err(err) = self.inner.backend.put(&entry) {
            self.degrade("put", key, &err);
        }
        self.inner
            .strategies
            .record_write(key, previous_value.as_ref(), &entry.value)
            .await;
        previous_value
    }

    // == Remove ==
    /// Removes a key from both tiers. Returns true if either tier held it.
    pub async fn remove(&self, key: &str) -> bool {
        let removed_hot = {
            let mut hot = self.inner.hot.write().await;
            let tier = &mut *hot;
            tier.recency.remove(key);
            tier.entries.remove(key).is_some()
        };
        let removed_persisted = match self.inner.backend.delete(key) {
            Ok(removed) => removed,
            Err(err) => {
                self.degrade("delete", key, &err);
                false
            }
        };
        removed_hot || removed_persisted
    }

    // == Clear ==
    /// Drops every entry from both tiers.
    pub async fn clear(&self) {
        {
            let mut hot = self.inner.hot.write().await;
            let tier = &mut *hot;
            tier.entries.clear();
            tier.recency.clear();
        }
        match self.inner.backend.keys() {
            Ok(keys) => {
                for key in keys {
                    if let Err(err) = self.inner.backend.delete(&key) {
                        self.degrade("delete", &key, &err);
                    }
                }
            }
            Err(err) => self.degrade("keys", "*", &err),
        }
    }

    // == Get Or Load ==
    /// Returns a fresh value immediately; serves a stale value while a
    /// background refresh runs; loads synchronously on miss or expiry.
    ///
    /// At most one loader runs per key at any time: concurrent callers
    /// for the same key receive the result (or error) of the single
    /// in-flight execution.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        ttl_ms: Option<u64>,
        loader: F,
    ) -> Result<Value>
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let now = self.inner.clock.now_ms();
        if let Some(entry) = self.get(key).await {
            match self.inner.policy.classify(&entry, now) {
                Freshness::Fresh => return Ok(entry.value),
                Freshness::Stale => {
                    debug!(key, "serving stale value while revalidating");
                    let store = self.clone();
                    let owned_key = key.to_string();
                    let ttl = Some(entry.ttl_ms);
                    tokio::spawn(async move {
                        // A racing revalidation may have landed first
                        if store.is_fresh(&owned_key).await {
                            return;
                        }
                        if let Err(err) = store.load_through(&owned_key, ttl, loader).await {
                            debug!(key = %owned_key, error = %err, "background revalidation failed");
                        }
                    });
                    return Ok(entry.value);
                }
                Freshness::Expired => {}
            }
        }
        self.load_through(key, ttl_ms, loader).await
    }

    /// Runs `loader` under the per-key in-flight registry. The first
    /// caller becomes the leader; everyone else awaits its published
    /// outcome. The slot clears before the outcome is published, so no
    /// second load for the key can start while one is pending.
    async fn load_through<F, Fut>(&self, key: &str, ttl_ms: Option<u64>, loader: F) -> Result<Value>
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        enum Role {
            Leader(watch::Sender<LoadSlot>),
            Waiter(watch::Receiver<LoadSlot>),
        }

        let role = {
            let mut inflight = self.inner.inflight.lock().await;
            match inflight.get(key) {
                Some(rx) => Role::Waiter(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.to_string(), rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Waiter(mut rx) => loop {
                {
                    let slot = rx.borrow_and_update();
                    if let Some(outcome) = slot.as_ref() {
                        return match outcome {
                            LoadOutcome::Loaded(value) => Ok(value.clone()),
                            LoadOutcome::Failed(message) => Err(CacheError::LoadFailed {
                                key: key.to_string(),
                                message: message.clone(),
                            }),
                        };
                    }
                }
                if rx.changed().await.is_err() {
                    // Leader dropped without publishing; clear its slot so
                    // the next caller can start over
                    let mut inflight = self.inner.inflight.lock().await;
                    let abandoned = inflight
                        .get(key)
                        .map(|r| r.has_changed().is_err())
                        .unwrap_or(false);
                    if abandoned {
                        inflight.remove(key);
                    }
                    return Err(CacheError::LoadFailed {
                        key: key.to_string(),
                        message: "in-flight load abandoned".to_string(),
                    });
                }
            },
            Role::Leader(tx) => {
                self.inner.stats.record_load();
                let outcome = match loader(key.to_string()).await {
                    Ok(value) => {
                        self.put(key, value.clone(), ttl_ms).await;
                        LoadOutcome::Loaded(value)
                    }
                    Err(err) => {
                        // Previous entry, if any, stays untouched
                        self.inner.stats.record_load_failure();
                        warn!(key, error = %err, "loader failed");
                        LoadOutcome::Failed(err.to_string())
                    }
                };
                self.inner.inflight.lock().await.remove(key);
                let _ = tx.send(Some(outcome.clone()));
                match outcome {
                    LoadOutcome::Loaded(value) => Ok(value),
                    LoadOutcome::Failed(message) => Err(CacheError::LoadFailed {
                        key: key.to_string(),
                        message,
                    }),
                }
            }
        }
    }

    // == Eviction Support ==
    /// Number of entries currently in the hot tier.
    pub async fn hot_len(&self) -> usize {
        self.inner.hot.read().await.entries.len()
    }

    /// Point-in-time `(key, last_accessed_at)` snapshot of the hot tier,
    /// taken without holding the lock during scoring.
    pub async fn access_snapshot(&self) -> Vec<(String, u64)> {
        self.inner
            .hot
            .read()
            .await
            .entries
            .values()
            .map(|e| (e.key.clone(), e.last_accessed_at))
            .collect()
    }

    /// Copy of a hot-tier entry without touching access metadata.
    pub async fn peek_hot(&self, key: &str) -> Option<CacheEntry> {
        self.inner.hot.read().await.entries.get(key).cloned()
    }

    /// True when the hot tier holds a currently fresh copy of `key`.
    async fn is_fresh(&self, key: &str) -> bool {
        let now = self.inner.clock.now_ms();
        match self.peek_hot(key).await {
            Some(entry) => self.inner.policy.classify(&entry, now) == Freshness::Fresh,
            None => false,
        }
    }

    /// Verifies the persisted tier holds `key` before it is evicted from
    /// the hot tier, writing it out if missing. `Ok(false)` means the key
    /// is no longer in the hot tier at all.
    pub async fn ensure_persisted(&self, key: &str) -> Result<bool> {
        let Some(entry) = self.peek_hot(key).await else {
            return Ok(false);
        };
        match self.inner.backend.get(key)? {
            Some(_) => Ok(true),
            None => {
                self.inner.backend.put(&entry)?;
                Ok(true)
            }
        }
    }

    /// Removes the given keys from the hot tier only; the persisted tier
    /// keeps serving them at higher latency. Returns the eviction count.
    pub async fn evict_keys(&self, keys: &[String]) -> usize {
        let mut hot = self.inner.hot.write().await;
        let tier = &mut *hot;
        let mut evicted = 0;
        for key in keys {
            if tier.entries.remove(key).is_some() {
                tier.recency.remove(key);
                self.inner.stats.record_eviction();
                evicted += 1;
            }
        }
        evicted
    }

    // == Stats Support ==
    /// Mean age of hot-tier entries in milliseconds.
    pub async fn average_age_ms(&self) -> u64 {
        let now = self.inner.clock.now_ms();
        let hot = self.inner.hot.read().await;
        if hot.entries.is_empty() {
            return 0;
        }
        let total: u64 = hot.entries.values().map(|e| e.age_ms(now)).sum();
        total / hot.entries.len() as u64
    }

    // == Internals ==
    /// Inserts into the hot tier, discarding the LRU entry when a new key
    /// would push the tier over capacity.
    fn insert_hot(hot: &mut HotTier, entry: CacheEntry, max_entries: usize, stats: &StatsRecorder) {
        let is_new_key = !hot.entries.contains_key(&entry.key);
        if is_new_key && hot.entries.len() >= max_entries {
            if let Some(coldest) = hot.recency.take_coldest() {
                hot.entries.remove(&coldest);
                stats.record_eviction();
            }
        }
        hot.recency.touch(&entry.key);
        hot.entries.insert(entry.key.clone(), entry);
    }

    fn degrade(&self, op: &str, key: &str, err: &CacheError) {
        self.inner.stats.record_backend_degradation();
        warn!(op, key, error = %err, "persisted tier degraded, serving in-process only");
    }
}

//! Persistence Backend Module
//!
//! Minimal contract for the unbounded persisted tier. The store treats the
//! backend as unreliable: any error degrades the affected call to
//! in-process-only instead of surfacing to the caller.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{CacheError, Result};
use crate::store::CacheEntry;

// == Persistence Backend ==
/// Contract for the persisted tier.
///
/// Implementations should be fast or internally buffered; writes hold the
/// in-process tier lock across the predecessor lookup. Failures are
/// reported as `CacheError::BackendUnavailable`.
pub trait PersistenceBackend: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn put(&self, entry: &CacheEntry) -> Result<()>;
    fn delete(&self, key: &str) -> Result<bool>;
    fn keys(&self) -> Result<Vec<String>>;
}

// == Memory Backend ==
/// In-memory reference backend for tests and single-process deployments.
///
/// No ordering is maintained; the persisted tier has no LRU requirement.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries
            .lock()
            .map_err(|_| CacheError::BackendUnavailable("backend lock poisoned".to_string()))
    }
}

impl PersistenceBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.lock()?.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

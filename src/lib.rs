//! Marketcache - An adaptive cache for remote market data
//!
//! Two-tier entry storage with TTL expiration, pressure-driven LRU
//! eviction, per-key adaptive refresh strategies and ranked prefetch.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod evictor;
pub mod pressure;
pub mod store;
pub mod strategy;
pub mod tasks;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use coordinator::{Coordinator, PrefetchSuggestion};
pub use dedup::{batch_dedup, batch_dedup_by};
pub use engine::{CacheEngine, EngineStats, EngineTasks};
pub use error::{CacheError, Result};
pub use evictor::{Evictor, FullCollectionHook, SweepOutcome};
pub use pressure::{PressureLevel, PressureState};
pub use store::{CacheEntry, EntryStore, Freshness, MemoryBackend, PersistenceBackend};
pub use strategy::{StrategyEngine, StrategyPreset, StrategySeed, StrategySnapshot};
pub use tasks::{spawn_prefetch_task, spawn_pressure_task, spawn_strategy_sweep_task};

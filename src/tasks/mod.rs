//! Background Tasks Module
//!
//! Timer- and signal-driven loops that run alongside the engine:
//!
//! # Tasks
//! - Pressure eviction: reacts to host pressure notifications
//! - Prefetch ranking: emits a bounded ranked key list on a fixed interval
//! - Strategy sweep: periodic batch re-analysis of tracked strategies

mod sweep;

pub use sweep::{spawn_prefetch_task, spawn_pressure_task, spawn_strategy_sweep_task};

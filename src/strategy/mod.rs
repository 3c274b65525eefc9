//! Adaptive Refresh Strategy Module
//!
//! Per-key refresh policies with bounded, volatility- and
//! frequency-driven interval tuning.

mod engine;
mod preset;

#[cfg(test)]
mod property_tests;

pub use engine::{StrategyEngine, StrategySnapshot, DEFAULT_UNTRACKED_PRIORITY};
pub use preset::{StrategyPreset, StrategySeed};

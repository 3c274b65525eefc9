//! Strategy Presets Module
//!
//! Seed parameters for the four registration presets. The adaptive
//! algorithm drifts away from the seed over time based on observed
//! access frequency and volatility.

use serde::Serialize;

// == Strategy Preset ==
/// Named starting point for a key's refresh policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyPreset {
    /// Floor-bound interval, prefetch on, high priority. For keys whose
    /// payloads move with the market.
    HighFrequency,
    /// Mid interval, default priority. Reasonable for most series.
    Balanced,
    /// Ceiling-bound interval, prefetch off, low priority. For slow-moving
    /// valuation snapshots.
    LowFrequency,
    /// Mid interval, prefetch on; relies on volatility observations to
    /// find the right cadence.
    Adaptive,
}

impl StrategyPreset {
    /// Stable name used in statistics and logs.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyPreset::HighFrequency => "high_frequency",
            StrategyPreset::Balanced => "balanced",
            StrategyPreset::LowFrequency => "low_frequency",
            StrategyPreset::Adaptive => "adaptive",
        }
    }

    // == Seed ==
    /// Initial parameters for a strategy registered under this preset.
    pub fn seed(&self) -> StrategySeed {
        match self {
            StrategyPreset::HighFrequency => StrategySeed {
                initial_interval_ms: 60_000,
                floor_ms: 60_000,
                ceiling_ms: 900_000,
                priority: 0.8,
                prefetch_enabled: true,
            },
            StrategyPreset::Balanced => StrategySeed {
                initial_interval_ms: 1_800_000,
                floor_ms: 300_000,
                ceiling_ms: 7_200_000,
                priority: 0.5,
                prefetch_enabled: true,
            },
            StrategyPreset::LowFrequency => StrategySeed {
                initial_interval_ms: 86_400_000,
                floor_ms: 1_800_000,
                ceiling_ms: 86_400_000,
                priority: 0.2,
                prefetch_enabled: false,
            },
            StrategyPreset::Adaptive => StrategySeed {
                initial_interval_ms: 1_200_000,
                floor_ms: 120_000,
                ceiling_ms: 14_400_000,
                priority: 0.5,
                prefetch_enabled: true,
            },
        }
    }
}

// == Strategy Seed ==
/// Raw registration parameters, validated by the strategy engine.
#[derive(Debug, Clone, Copy)]
pub struct StrategySeed {
    pub initial_interval_ms: u64,
    pub floor_ms: u64,
    pub ceiling_ms: u64,
    pub priority: f64,
    pub prefetch_enabled: bool,
}

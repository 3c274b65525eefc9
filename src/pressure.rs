//! Memory Pressure Module
//!
//! Host-published memory headroom classification. The host owns the
//! state and pushes updates over a `tokio::sync::watch` channel; only
//! the latest value is authoritative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Pressure Level ==
/// Discrete classification of available memory headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureLevel {
    Normal,
    Elevated,
    High,
    Critical,
}

impl PressureLevel {
    /// Fraction of configured capacity the hot tier is reduced to at
    /// this level. `None` means no eviction runs at all.
    pub fn occupancy_target(&self) -> Option<f64> {
        match self {
            PressureLevel::Normal => None,
            PressureLevel::Elevated => Some(0.8),
            PressureLevel::High => Some(0.5),
            PressureLevel::Critical => Some(0.3),
        }
    }
}

// == Pressure State ==
/// Latest pressure observation. Single writer (the host), many readers.
#[derive(Debug, Clone, Serialize)]
pub struct PressureState {
    pub level: PressureLevel,
    /// Continuous severity in [0, 1], alongside the discrete level.
    pub scalar: f64,
    pub observed_at: DateTime<Utc>,
}

impl PressureState {
    pub fn new(level: PressureLevel, scalar: f64) -> Self {
        Self {
            level,
            scalar: scalar.clamp(0.0, 1.0),
            observed_at: Utc::now(),
        }
    }

    /// The no-pressure state every channel starts from.
    pub fn normal() -> Self {
        Self::new(PressureLevel::Normal, 0.0)
    }
}

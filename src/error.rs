//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The caller-supplied loader failed. Propagated to every caller
    /// waiting on the same in-flight load.
    #[error("load failed for key '{key}': {message}")]
    LoadFailed { key: String, message: String },

    /// No strategy is tracked for the requested key.
    #[error("key not tracked: {0}")]
    NotFound(String),

    /// A persisted-tier call failed. The engine degrades to
    /// in-process-only for the affected call.
    #[error("persisted tier unavailable: {0}")]
    BackendUnavailable(String),

    /// Strategy registration with floor > ceiling, an interval outside
    /// the bounds, or a priority outside [0, 1].
    #[error("invalid strategy bounds for key '{key}': {reason}")]
    InvalidStrategyBounds { key: String, reason: String },
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_key() {
        let err = CacheError::LoadFailed {
            key: "fund:F001".to_string(),
            message: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("fund:F001"));
        assert!(err.to_string().contains("connection reset"));

        let err = CacheError::InvalidStrategyBounds {
            key: "fund:F001".to_string(),
            reason: "floor exceeds ceiling".to_string(),
        };
        assert!(err.to_string().contains("floor exceeds ceiling"));
    }
}

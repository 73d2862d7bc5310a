//! RoCC error types

use thiserror::Error;

/// Construction-time errors.
///
/// Per-sample conditions (stale samples, unknown RTT, transiently inconsistent
/// beliefs) are never errors; they are absorbed by skip/clamp logic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Interval history depth is not a power of two
    #[error("interval history depth must be a non-zero power of two, got {depth}")]
    HistoryDepthNotPowerOfTwo {
        /// Requested depth
        depth: usize,
    },

    /// Interval history cannot cover the windowed totals
    #[error("interval history depth {depth} is too shallow for {history_periods} history periods")]
    HistoryTooShallow {
        /// Requested depth
        depth: usize,
        /// Requested history periods
        history_periods: u32,
    },

    /// Loss threshold outside `1..1024`
    #[error("loss threshold must be in 1..1024 (1/1024ths), got {threshold}")]
    LossThresholdOutOfRange {
        /// Requested threshold
        threshold: u64,
    },

    /// A parameter that must be non-zero was zero
    #[error("parameter `{name}` must be non-zero")]
    ZeroParameter {
        /// Parameter name
        name: &'static str,
    },

    /// Per-connection state does not fit in the caller's storage budget
    #[error("connection state needs {required} bytes, budget is {budget}")]
    StateTooLarge {
        /// Bytes needed by the state
        required: usize,
        /// Bytes the caller allows
        budget: usize,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

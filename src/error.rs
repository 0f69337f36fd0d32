//! Error types for simbatch.

use thiserror::Error;

/// Result type alias for simbatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for simbatch.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown memory-scaling metric name.
    #[error("invalid metric: {0}")]
    InvalidMetric(String),

    /// A single state's memory scaler exceeds the configured ceiling.
    #[error("state memory scaler {scaler} is greater than max_memory_scaler {max}")]
    CapacityExceeded { scaler: f64, max: f64 },

    /// Reordered results do not account for every loaded state.
    #[error("number of states ({actual}) does not match number expected ({expected})")]
    CountMismatch { expected: usize, actual: usize },

    /// Convergence flags are not aligned with the active batch members.
    #[error("{actual} convergence flags for {expected} active states")]
    ConvergenceMismatch { expected: usize, actual: usize },

    /// The engine ran out of resources on the smallest possible batch.
    #[error("resource exhaustion at batch size {0}")]
    ResourceExhausted(usize),

    /// Malformed state tensors (shape or dtype disagreement).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

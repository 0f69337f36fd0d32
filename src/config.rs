//! Configuration types for simbatch.

use serde::{Deserialize, Serialize};

use crate::core::metrics::MemoryMetric;
use crate::error::Result;

/// Batcher configuration, shared by the chunking and hot-swapping batchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Metric used to estimate each state's memory demand.
    pub metric: MemoryMetric,
    /// Maximum admissible sum of memory scalers within one batch.
    pub max_memory_scaler: f64,
    /// Return original submission indices alongside each batch.
    ///
    /// Read by the hot-swapping batcher, which has a single `next_batch`
    /// entry point. The chunking batcher ignores it: callers pick between
    /// `next_batch` and `next_batch_with_indices` instead.
    pub return_indices: bool,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            metric: MemoryMetric::NAtoms,
            max_memory_scaler: 1_000_000.0,
            return_indices: false,
        }
    }
}

impl BatcherConfig {
    /// Create a config with the given metric and ceiling.
    pub fn new(metric: MemoryMetric, max_memory_scaler: f64) -> Self {
        Self {
            metric,
            max_memory_scaler,
            return_indices: false,
        }
    }

    /// Enable returning original submission indices with each batch.
    pub fn with_indices(mut self) -> Self {
        self.return_indices = true;
        self
    }

    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

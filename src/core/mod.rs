//! Core data model: simulation states and memory metrics.

pub mod metrics;
pub mod state;

pub use metrics::{memory_scaler, MemoryMetric};
pub use state::{merge_states, split_state, SimState};

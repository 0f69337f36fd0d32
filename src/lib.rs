//! simbatch: memory-aware autobatching for atomistic simulation workloads.
//!
//! Schedules variable-cost simulation states into bounded-capacity batches
//! for repeated processing by an external engine:
//! - Memory-scaling metrics to estimate per-state cost
//! - Static chunked batching via first-fit-decreasing bin packing
//! - Hot-swapping batching that refills an active batch as members converge
//! - Fibonacci capacity probing to discover the engine's batch-size ceiling
//!
//! The engine itself is out of scope: the batchers hand out merged
//! [`SimState`] batches and the caller drives the processing loop.

pub mod config;
pub mod error;

pub mod core;
pub mod scheduler;

pub use crate::core::{memory_scaler, merge_states, split_state, MemoryMetric, SimState};
pub use config::BatcherConfig;
pub use error::{Error, Result};
pub use scheduler::{
    determine_max_batch_size, estimate_max_memory_scaler, pack_bins, ChunkingBatcher,
    HotSwapBatcher, ProbeOutcome, SwapRound,
};

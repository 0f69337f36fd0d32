//! Autobatching schedulers and capacity probing.

pub mod binpack;
pub mod chunking;
pub mod hotswap;
pub mod probe;

pub use binpack::pack_bins;
pub use chunking::ChunkingBatcher;
pub use hotswap::{HotSwapBatcher, SwapRound};
pub use probe::{determine_max_batch_size, estimate_max_memory_scaler, ProbeOutcome};

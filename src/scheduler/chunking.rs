//! Static chunking batcher.
//!
//! Loads a fixed list of states once, partitions them into
//! ceiling-bounded groups with [`pack_bins`](crate::scheduler::binpack::pack_bins),
//! and hands out one merged batch per pull. Intended for workloads where
//! every state needs the same number of engine calls, so the partition
//! never has to change mid-run.
//!
//! ## Example
//!
//! ```
//! use candle_core::Device;
//! use simbatch::config::BatcherConfig;
//! use simbatch::core::metrics::MemoryMetric;
//! use simbatch::core::state::SimState;
//! use simbatch::scheduler::chunking::ChunkingBatcher;
//!
//! let device = Device::Cpu;
//! let cell = [[5.4, 0.0, 0.0], [0.0, 5.4, 0.0], [0.0, 0.0, 5.4]];
//! let states = vec![
//!     SimState::single(vec![[0.0; 3]; 4], vec![14; 4], cell, &device).unwrap(),
//!     SimState::single(vec![[0.0; 3]; 2], vec![26; 2], cell, &device).unwrap(),
//! ];
//!
//! let config = BatcherConfig::new(MemoryMetric::NAtoms, 10.0);
//! let mut batcher = ChunkingBatcher::new(config);
//! batcher.load(states).unwrap();
//!
//! let mut processed = Vec::new();
//! while let Some(batch) = batcher.next_batch().unwrap() {
//!     // caller runs the engine on `batch` here
//!     processed.push(batch);
//! }
//! let restored = batcher.restore_original_order(processed).unwrap();
//! assert_eq!(restored.len(), 2);
//! ```

use tracing::debug;

use crate::config::BatcherConfig;
use crate::core::metrics::memory_scaler;
use crate::core::state::{merge_states, split_state, SimState};
use crate::error::{Error, Result};
use crate::scheduler::binpack::pack_bins;

/// Static scheduler: one partition, pulled batch by batch.
///
/// The partition is built eagerly at [`load`](Self::load) and is stable for
/// the lifetime of the instance; restarting requires a fresh `load`. A
/// state whose scaler alone exceeds the ceiling is tolerated as a singleton
/// batch (it may still fail in the engine, but it is never dropped).
#[derive(Debug)]
pub struct ChunkingBatcher {
    config: BatcherConfig,
    /// Loaded states, submission order.
    states: Vec<SimState>,
    /// Memory scaler per loaded state, submission order.
    memory_scalers: Vec<f64>,
    /// Partition groups of original indices, in emission order.
    index_bins: Vec<Vec<usize>>,
    /// Next group to emit.
    cursor: usize,
}

impl ChunkingBatcher {
    /// Create an empty batcher with the given configuration.
    pub fn new(config: BatcherConfig) -> Self {
        Self {
            config,
            states: Vec::new(),
            memory_scalers: Vec::new(),
            index_bins: Vec::new(),
            cursor: 0,
        }
    }

    /// Load states and build the partition.
    ///
    /// Replaces any previously loaded states and resets the pull cursor.
    pub fn load(&mut self, states: Vec<SimState>) -> Result<()> {
        let mut scalers = Vec::with_capacity(states.len());
        for state in &states {
            scalers.push(memory_scaler(state, self.config.metric)?);
        }

        self.index_bins = pack_bins(&scalers, self.config.max_memory_scaler);
        self.memory_scalers = scalers;
        self.states = states;
        self.cursor = 0;

        debug!(
            n_states = self.states.len(),
            n_bins = self.index_bins.len(),
            metric = self.config.metric.as_str(),
            "loaded states into chunking batcher"
        );
        Ok(())
    }

    /// Whether another batch remains to be pulled.
    pub fn has_next(&self) -> bool {
        self.cursor < self.index_bins.len()
    }

    /// Pull the next merged batch, or `None` when the partition is
    /// exhausted.
    pub fn next_batch(&mut self) -> Result<Option<SimState>> {
        Ok(self.pull()?.map(|(batch, _)| batch))
    }

    /// Pull the next merged batch together with the original submission
    /// indices of its members, in packed order.
    pub fn next_batch_with_indices(&mut self) -> Result<Option<(SimState, Vec<usize>)>> {
        self.pull()
    }

    fn pull(&mut self) -> Result<Option<(SimState, Vec<usize>)>> {
        let Some(bin) = self.index_bins.get(self.cursor) else {
            return Ok(None);
        };
        let members: Vec<SimState> = bin.iter().map(|&i| self.states[i].clone()).collect();
        let batch = merge_states(&members)?;

        debug!(
            bin = self.cursor,
            n_members = bin.len(),
            n_atoms = batch.n_atoms(),
            "emitting batch"
        );
        self.cursor += 1;
        Ok(Some((batch, bin.clone())))
    }

    /// Memory scalers of the loaded states, in submission order.
    pub fn memory_scalers(&self) -> &[f64] {
        &self.memory_scalers
    }

    /// Partition groups of original submission indices.
    pub fn index_bins(&self) -> &[Vec<usize>] {
        &self.index_bins
    }

    /// Number of batches the partition will emit.
    pub fn n_bins(&self) -> usize {
        self.index_bins.len()
    }

    /// Put processed results back into submission order.
    ///
    /// Accepts merged batches, single states, or a mix (the caller may have
    /// split batches between rounds); every element is flattened to its
    /// member systems before index lookup. The results must cover the
    /// partition in emission order.
    pub fn restore_original_order(&self, results: Vec<SimState>) -> Result<Vec<SimState>> {
        let mut leaves = Vec::with_capacity(self.states.len());
        for result in &results {
            leaves.extend(split_state(result)?);
        }

        let expected = self.states.len();
        if leaves.len() != expected {
            return Err(Error::CountMismatch {
                expected,
                actual: leaves.len(),
            });
        }

        let mut indexed: Vec<(usize, SimState)> = self
            .index_bins
            .iter()
            .flatten()
            .copied()
            .zip(leaves)
            .collect();
        indexed.sort_by_key(|(idx, _)| *idx);
        Ok(indexed.into_iter().map(|(_, state)| state).collect())
    }
}

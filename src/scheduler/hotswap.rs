//! Hot-swapping online batcher.
//!
//! Keeps one active batch as full as the ceiling allows across many
//! processing rounds: each round the caller reports which members have
//! converged, the batcher evicts them, and the freed capacity is refilled
//! from a FIFO queue of pending states. Intended for workloads where
//! states finish after wildly different numbers of engine calls, so a
//! static partition would waste capacity on stragglers.
//!
//! ## Round Loop
//!
//! ```text
//!   load()                       next_batch(current, convergence)
//!     │                                       │
//!     ▼                                       ▼
//!  ┌─────────┐    greedy FIFO fill      ┌────────────┐
//!  │ Pending │ ───────────────────────► │   Active   │
//!  │  Queue  │   (while sum ≤ ceiling)  │   Batch    │
//!  └─────────┘                          └────────────┘
//!                                             │ convergence flag
//!                                             ▼
//!                                       ┌────────────┐
//!                                       │ Completed  │
//!                                       │  Registry  │
//!                                       └────────────┘
//! ```
//!
//! The scheduler never calls the engine; the caller runs it on the
//! returned batch strictly between `next_batch` calls. One instance per
//! logical caller: there is no internal synchronization.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::BatcherConfig;
use crate::core::metrics::memory_scaler;
use crate::core::state::{merge_states, split_state, SimState};
use crate::error::{Error, Result};

/// Output of one hot-swap round.
///
/// `batch` is `None` exactly when both the active set and the pending
/// queue are empty, i.e. the run is complete.
#[derive(Debug)]
pub struct SwapRound {
    /// The refilled batch to process next, if any work remains.
    pub batch: Option<SimState>,
    /// Members evicted this round, in eviction order.
    pub popped: Vec<SimState>,
    /// Original submission indices of `batch`'s members, in batch order.
    /// Empty unless `return_indices` is configured.
    pub indices: Vec<usize>,
}

/// Online scheduler with per-round eviction and refill.
///
/// Unlike [`ChunkingBatcher`](crate::scheduler::chunking::ChunkingBatcher),
/// an over-ceiling state is rejected at load time: it could never share a
/// batch, and the hot-swap loop has no singleton escape hatch.
#[derive(Debug)]
pub struct HotSwapBatcher {
    config: BatcherConfig,
    /// Not-yet-admitted states, submission order: (original index, scaler, state).
    pending: VecDeque<(usize, f64, SimState)>,
    /// Scalers of active members, batch order.
    current_scalers: Vec<f64>,
    /// Original indices of active members, batch order.
    current_idx: Vec<usize>,
    /// Original indices of completed states, eviction order.
    completed_idx: Vec<usize>,
    /// Number of states loaded.
    n_loaded: usize,
}

impl HotSwapBatcher {
    /// Create an empty batcher with the given configuration.
    pub fn new(config: BatcherConfig) -> Self {
        Self {
            config,
            pending: VecDeque::new(),
            current_scalers: Vec::new(),
            current_idx: Vec::new(),
            completed_idx: Vec::new(),
            n_loaded: 0,
        }
    }

    /// Load states into the pending queue, submission order preserved.
    ///
    /// Fails with [`Error::CapacityExceeded`] if any single state's scaler
    /// exceeds the ceiling; nothing is initialized on failure.
    pub fn load(&mut self, states: Vec<SimState>) -> Result<()> {
        let max = self.config.max_memory_scaler;
        let mut scalers = Vec::with_capacity(states.len());
        for state in &states {
            let scaler = memory_scaler(state, self.config.metric)?;
            if scaler > max {
                return Err(Error::CapacityExceeded { scaler, max });
            }
            scalers.push(scaler);
        }

        self.n_loaded = states.len();
        self.pending = states
            .into_iter()
            .zip(scalers)
            .enumerate()
            .map(|(idx, (state, scaler))| (idx, scaler, state))
            .collect();
        self.current_scalers.clear();
        self.current_idx.clear();
        self.completed_idx.clear();

        debug!(
            n_states = self.n_loaded,
            metric = self.config.metric.as_str(),
            max_memory_scaler = max,
            "loaded states into hot-swap batcher"
        );
        Ok(())
    }

    /// Advance one round: evict converged members of `current`, refill
    /// from the pending queue, and return the next batch.
    ///
    /// On the first call `current` and `convergence` are `None` and the
    /// batch is filled from scratch. On later calls `convergence` must
    /// hold exactly one flag per member of `current`, aligned by position.
    pub fn next_batch(
        &mut self,
        current: Option<&SimState>,
        convergence: Option<&[bool]>,
    ) -> Result<SwapRound> {
        let mut popped = Vec::new();
        let mut keepers: Vec<SimState> = Vec::new();

        let flags = convergence.unwrap_or(&[]);
        if self.current_idx.is_empty() {
            if !flags.is_empty() {
                return Err(Error::ConvergenceMismatch {
                    expected: 0,
                    actual: flags.len(),
                });
            }
        } else {
            if flags.len() != self.current_idx.len() {
                return Err(Error::ConvergenceMismatch {
                    expected: self.current_idx.len(),
                    actual: flags.len(),
                });
            }
            let current = current.ok_or_else(|| {
                Error::InvalidState("active batch exists but no current state was given".into())
            })?;
            let members = split_state(current)?;
            if members.len() != self.current_idx.len() {
                return Err(Error::ConvergenceMismatch {
                    expected: self.current_idx.len(),
                    actual: members.len(),
                });
            }

            let mut kept_scalers = Vec::new();
            let mut kept_idx = Vec::new();
            for (slot, member) in members.into_iter().enumerate() {
                if flags[slot] {
                    debug!(
                        original_idx = self.current_idx[slot],
                        "evicting converged state"
                    );
                    self.completed_idx.push(self.current_idx[slot]);
                    popped.push(member);
                } else {
                    kept_scalers.push(self.current_scalers[slot]);
                    kept_idx.push(self.current_idx[slot]);
                    keepers.push(member);
                }
            }
            self.current_scalers = kept_scalers;
            self.current_idx = kept_idx;
        }

        // Greedy FIFO refill: admit while the ceiling allows.
        let mut active_sum: f64 = self.current_scalers.iter().sum();
        while self
            .pending
            .front()
            .is_some_and(|(_, scaler, _)| active_sum + scaler <= self.config.max_memory_scaler)
        {
            if let Some((idx, scaler, state)) = self.pending.pop_front() {
                debug!(original_idx = idx, scaler, "admitting pending state");
                active_sum += scaler;
                self.current_scalers.push(scaler);
                self.current_idx.push(idx);
                keepers.push(state);
            }
        }

        let batch = if keepers.is_empty() {
            None
        } else {
            Some(merge_states(&keepers)?)
        };
        let indices = if self.config.return_indices && batch.is_some() {
            self.current_idx.clone()
        } else {
            Vec::new()
        };

        Ok(SwapRound {
            batch,
            popped,
            indices,
        })
    }

    /// Put completed states back into submission order.
    ///
    /// `completed` must hold every state evicted so far, in eviction order
    /// (the concatenation of the `popped` lists); fails with
    /// [`Error::CountMismatch`] otherwise.
    pub fn restore_original_order(&self, completed: Vec<SimState>) -> Result<Vec<SimState>> {
        if completed.len() != self.completed_idx.len() {
            return Err(Error::CountMismatch {
                expected: self.completed_idx.len(),
                actual: completed.len(),
            });
        }

        let mut indexed: Vec<(usize, SimState)> =
            self.completed_idx.iter().copied().zip(completed).collect();
        indexed.sort_by_key(|(idx, _)| *idx);
        Ok(indexed.into_iter().map(|(_, state)| state).collect())
    }

    /// Number of states waiting in the pending queue.
    pub fn n_pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of members in the active batch.
    pub fn n_active(&self) -> usize {
        self.current_idx.len()
    }

    /// Number of states completed so far.
    pub fn n_completed(&self) -> usize {
        self.completed_idx.len()
    }

    /// Memory scalers of the active members, batch order.
    pub fn current_scalers(&self) -> &[f64] {
        &self.current_scalers
    }

    /// Original submission indices of the active members, batch order.
    pub fn current_indices(&self) -> &[usize] {
        &self.current_idx
    }

    /// Original indices of completed states, eviction order.
    pub fn completed_indices(&self) -> &[usize] {
        &self.completed_idx
    }

    /// Whether every loaded state has been completed.
    pub fn is_done(&self) -> bool {
        self.completed_idx.len() == self.n_loaded
    }
}

//! Empirical capacity probing.
//!
//! Before scheduling begins, the prober discovers how large a batch the
//! engine can actually process by probing synthetic batches of a template
//! state at growing sizes. Growth follows the Fibonacci sequence: close to
//! exponential search in probe count, but with gentler steps, so the first
//! failing size overshoots the true ceiling by less than doubling would.
//!
//! Exhaustion is an ordinary value here, not a fault: the probe callback
//! returns [`ProbeOutcome`] and the search loop branches on it.

use tracing::debug;

use crate::core::metrics::{memory_scaler, MemoryMetric};
use crate::core::state::{merge_states, SimState};
use crate::error::{Error, Result};

/// Result of one capacity probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    /// The engine processed the batch; measured resource usage (the search
    /// ignores the value, it is reported for caller-side diagnostics).
    Usage(f64),
    /// The engine ran out of resources on this batch.
    ResourceExhausted,
}

/// Fibonacci values starting at 1, 2 and strictly below `limit`.
fn fibonacci_below(limit: usize) -> Vec<usize> {
    let mut sizes = Vec::new();
    let (mut a, mut b) = (1usize, 2usize);
    while a < limit {
        sizes.push(a);
        (a, b) = (b, a + b);
    }
    sizes
}

/// Find the largest batch size the engine can process without exhaustion.
///
/// Builds a batch of N copies of `template` for each Fibonacci candidate N
/// below `max_atoms` and probes it. The first exhausted candidate ends the
/// search and the largest previously successful size is returned; if no
/// candidate is ever exhausted the largest attempted size is returned.
///
/// Fails with [`Error::ResourceExhausted`] when even a batch of one
/// exhausts the engine, and with [`Error::InvalidState`] when `max_atoms`
/// leaves no candidate to try.
pub fn determine_max_batch_size<E, F>(
    template: &SimState,
    engine: &mut E,
    max_atoms: usize,
    mut probe: F,
) -> Result<usize>
where
    F: FnMut(&SimState, &mut E) -> Result<ProbeOutcome>,
{
    let sizes = fibonacci_below(max_atoms);
    if sizes.is_empty() {
        return Err(Error::InvalidState(format!(
            "max_atoms {max_atoms} leaves no batch size to probe"
        )));
    }

    let mut last_ok = None;
    for &size in &sizes {
        let copies = vec![template.clone(); size];
        let batch = merge_states(&copies)?;
        match probe(&batch, engine)? {
            ProbeOutcome::Usage(usage) => {
                debug!(size, usage, "probe succeeded");
                last_ok = Some(size);
            }
            ProbeOutcome::ResourceExhausted => {
                debug!(size, "probe exhausted resources");
                return last_ok.ok_or(Error::ResourceExhausted(size));
            }
        }
    }
    // sizes is non-empty, so at least one probe succeeded
    last_ok.ok_or(Error::ResourceExhausted(1))
}

/// Estimate a conservative per-batch memory-scaler ceiling from probes.
///
/// Probes the smallest- and largest-scaler states in `states` with
/// [`determine_max_batch_size`] and returns the smaller of the two implied
/// capacities, scaled by `safety_factor` (e.g. 0.8) to leave headroom for
/// engine-side fragmentation.
pub fn estimate_max_memory_scaler<E, F>(
    engine: &mut E,
    states: &[SimState],
    metric: MemoryMetric,
    max_atoms: usize,
    mut probe: F,
    safety_factor: f64,
) -> Result<f64>
where
    F: FnMut(&SimState, &mut E) -> Result<ProbeOutcome>,
{
    if states.is_empty() {
        return Err(Error::InvalidState(
            "cannot estimate a ceiling from zero states".into(),
        ));
    }

    let mut scalers = Vec::with_capacity(states.len());
    for state in states {
        scalers.push(memory_scaler(state, metric)?);
    }
    let (min_slot, max_slot) = {
        let mut min_slot = 0;
        let mut max_slot = 0;
        for (slot, &scaler) in scalers.iter().enumerate() {
            if scaler < scalers[min_slot] {
                min_slot = slot;
            }
            if scaler > scalers[max_slot] {
                max_slot = slot;
            }
        }
        (min_slot, max_slot)
    };

    let min_n = determine_max_batch_size(&states[min_slot], engine, max_atoms, &mut probe)?;
    let max_n = determine_max_batch_size(&states[max_slot], engine, max_atoms, &mut probe)?;

    let capacity = (min_n as f64 * scalers[min_slot]).min(max_n as f64 * scalers[max_slot]);
    let ceiling = capacity * safety_factor;
    debug!(min_n, max_n, ceiling, "estimated memory-scaler ceiling");
    Ok(ceiling)
}

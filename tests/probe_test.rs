//! Integration tests for capacity probing.

use candle_core::Device;
use simbatch::core::metrics::MemoryMetric;
use simbatch::core::state::SimState;
use simbatch::scheduler::probe::{
    determine_max_batch_size, estimate_max_memory_scaler, ProbeOutcome,
};
use simbatch::{Error, Result};

fn state_of(n_atoms: usize) -> SimState {
    let a = 5.43;
    let cell = [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]];
    SimState::single(vec![[0.0; 3]; n_atoms], vec![14; n_atoms], cell, &Device::Cpu).unwrap()
}

/// Stand-in engine that exhausts above a fixed atom budget.
struct FakeEngine {
    atom_budget: usize,
    calls: usize,
}

fn probe(batch: &SimState, engine: &mut FakeEngine) -> Result<ProbeOutcome> {
    engine.calls += 1;
    if batch.n_atoms() > engine.atom_budget {
        Ok(ProbeOutcome::ResourceExhausted)
    } else {
        Ok(ProbeOutcome::Usage(batch.n_atoms() as f64 * 0.1))
    }
}

#[test]
fn test_fibonacci_sequence_without_exhaustion() {
    let template = state_of(1);
    let mut engine = FakeEngine {
        atom_budget: usize::MAX,
        calls: 0,
    };

    // candidates are 1, 2, 3, 5, 8; 13 >= 10 is never attempted
    let max = determine_max_batch_size(&template, &mut engine, 10, probe).unwrap();
    assert_eq!(max, 8);
    assert_eq!(engine.calls, 5);
}

#[test]
fn test_stops_at_first_exhaustion() {
    // batches of 4-atom copies; budget 18 fails first at size 5
    let template = state_of(4);
    let mut engine = FakeEngine {
        atom_budget: 18,
        calls: 0,
    };

    let max = determine_max_batch_size(&template, &mut engine, 1000, probe).unwrap();
    assert_eq!(max, 3);
    // 1, 2, 3 succeed, 5 exhausts, search stops
    assert_eq!(engine.calls, 4);
}

#[test]
fn test_exhaustion_on_first_probe_is_an_error() {
    let template = state_of(100);
    let mut engine = FakeEngine {
        atom_budget: 10,
        calls: 0,
    };

    let err = determine_max_batch_size(&template, &mut engine, 1000, probe).unwrap_err();
    assert!(matches!(err, Error::ResourceExhausted(1)));
}

#[test]
fn test_no_candidate_to_probe() {
    let template = state_of(1);
    let mut engine = FakeEngine {
        atom_budget: usize::MAX,
        calls: 0,
    };

    assert!(determine_max_batch_size(&template, &mut engine, 1, probe).is_err());
    assert_eq!(engine.calls, 0);
}

#[test]
fn test_probe_error_propagates() {
    let template = state_of(1);
    let mut engine = ();
    let result = determine_max_batch_size(&template, &mut engine, 10, |_, _| {
        Err(Error::InvalidState("driver fault".into()))
    });
    assert!(result.is_err());
}

#[test]
fn test_estimate_max_memory_scaler() {
    let states = vec![state_of(2), state_of(8), state_of(4)];
    let mut engine = FakeEngine {
        atom_budget: 40,
        calls: 0,
    };

    // smallest state (2 atoms): sizes up to 13 fit (26 atoms), 21 exhausts
    // largest state (8 atoms): sizes up to 5 fit (40 atoms), 8 exhausts
    // capacity = min(13 * 2, 5 * 8) = 26, scaled by 0.8
    let ceiling = estimate_max_memory_scaler(
        &mut engine,
        &states,
        MemoryMetric::NAtoms,
        100,
        probe,
        0.8,
    )
    .unwrap();
    assert!((ceiling - 20.8).abs() < 1e-12);
}

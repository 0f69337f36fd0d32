//! Memory-scaling metrics for simulation states.
//!
//! A metric maps a state to a scalar "memory scaler": an estimate of how
//! much device memory the engine needs to process it. Metrics form a closed
//! set; unknown names are rejected at parse time.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::state::SimState;
use crate::error::{Error, Result};

/// Metric used to estimate a state's memory demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryMetric {
    /// Memory scales with atom count.
    NAtoms,
    /// Memory scales with atom count times number density.
    ///
    /// Captures that denser, larger systems cost super-linearly more.
    NAtomsXDensity,
}

impl MemoryMetric {
    /// Get the metric name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NAtoms => "n_atoms",
            Self::NAtomsXDensity => "n_atoms_x_density",
        }
    }
}

impl FromStr for MemoryMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "n_atoms" => Ok(Self::NAtoms),
            "n_atoms_x_density" => Ok(Self::NAtomsXDensity),
            other => Err(Error::InvalidMetric(other.to_string())),
        }
    }
}

/// Compute a state's memory scaler under the given metric.
///
/// Pure: no caching, no side effects.
///
/// - [`MemoryMetric::NAtoms`]: `n_atoms`
/// - [`MemoryMetric::NAtomsXDensity`]: `n_atoms * (n_atoms / v)` where `v`
///   is the primary cell volume in nm^3 (`|det(cell)| / 1000`)
pub fn memory_scaler(state: &SimState, metric: MemoryMetric) -> Result<f64> {
    let n_atoms = state.n_atoms() as f64;
    match metric {
        MemoryMetric::NAtoms => Ok(n_atoms),
        MemoryMetric::NAtomsXDensity => {
            let volume = state.primary_cell_determinant()?.abs() / 1000.0;
            Ok(n_atoms * (n_atoms / volume))
        }
    }
}

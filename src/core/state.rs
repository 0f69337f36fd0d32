//! Batched atomistic simulation state.
//!
//! A [`SimState`] holds one or more member systems packed into shared
//! tensors: atom positions, atomic numbers, per-system unit cells, and a
//! per-atom system index mapping each atom row to its member system.
//!
//! Batching is purely a packing concern: [`merge_states`] concatenates
//! states into one, [`split_state`] recovers the members. The two are exact
//! inverses on atom count and per-member content; only the batch-local
//! `system_idx` bookkeeping changes.
//!
//! ## Example
//!
//! ```
//! use candle_core::Device;
//! use simbatch::core::state::{merge_states, split_state, SimState};
//!
//! let device = Device::Cpu;
//! let cell = [[5.4, 0.0, 0.0], [0.0, 5.4, 0.0], [0.0, 0.0, 5.4]];
//! let a = SimState::single(vec![[0.0; 3]; 4], vec![14; 4], cell, &device).unwrap();
//! let b = SimState::single(vec![[0.0; 3]; 2], vec![26; 2], cell, &device).unwrap();
//!
//! let batch = merge_states(&[a, b]).unwrap();
//! assert_eq!(batch.n_atoms(), 6);
//! assert_eq!(batch.n_systems(), 2);
//!
//! let members = split_state(&batch).unwrap();
//! assert_eq!(members.len(), 2);
//! assert_eq!(members[0].n_atoms(), 4);
//! ```

use candle_core::{DType, Device, Tensor};

use crate::error::{Error, Result};

/// A batched atomistic state.
///
/// Invariants, checked at construction:
/// - `positions` is `(n_atoms, 3)` f64
/// - `atomic_numbers` is `(n_atoms,)` u32
/// - `cells` is `(n_systems, 3, 3)` f64
/// - `system_idx` is `(n_atoms,)` u32, non-decreasing, starting at 0 and
///   covering every system slot (atoms of one system are contiguous)
#[derive(Debug, Clone)]
pub struct SimState {
    /// Atom positions, `(n_atoms, 3)`.
    positions: Tensor,
    /// Atomic numbers, `(n_atoms,)`.
    atomic_numbers: Tensor,
    /// Unit cell matrices, `(n_systems, 3, 3)`.
    cells: Tensor,
    /// Per-atom system slot, `(n_atoms,)`.
    system_idx: Tensor,
}

impl SimState {
    /// Create a state from raw tensors, validating shapes and layout.
    pub fn new(
        positions: Tensor,
        atomic_numbers: Tensor,
        cells: Tensor,
        system_idx: Tensor,
    ) -> Result<Self> {
        let pos_dims = positions.dims();
        if pos_dims.len() != 2 || pos_dims[1] != 3 {
            return Err(Error::InvalidState(format!(
                "positions must be (n_atoms, 3), got {pos_dims:?}"
            )));
        }
        let n_atoms = pos_dims[0];
        if positions.dtype() != DType::F64 {
            return Err(Error::InvalidState("positions must be f64".into()));
        }

        if atomic_numbers.dims() != [n_atoms] {
            return Err(Error::InvalidState(format!(
                "atomic_numbers must be ({n_atoms},), got {:?}",
                atomic_numbers.dims()
            )));
        }

        let cell_dims = cells.dims();
        if cell_dims.len() != 3 || cell_dims[1] != 3 || cell_dims[2] != 3 {
            return Err(Error::InvalidState(format!(
                "cells must be (n_systems, 3, 3), got {cell_dims:?}"
            )));
        }
        let n_systems = cell_dims[0];

        if system_idx.dims() != [n_atoms] {
            return Err(Error::InvalidState(format!(
                "system_idx must be ({n_atoms},), got {:?}",
                system_idx.dims()
            )));
        }
        let idx = system_idx.to_vec1::<u32>()?;
        let mut prev = 0u32;
        for (row, &slot) in idx.iter().enumerate() {
            if row == 0 && slot != 0 {
                return Err(Error::InvalidState("system_idx must start at 0".into()));
            }
            if slot < prev || slot > prev + 1 {
                return Err(Error::InvalidState(
                    "system_idx must be contiguous and non-decreasing".into(),
                ));
            }
            prev = slot;
        }
        let covered = if n_atoms == 0 { 0 } else { prev as usize + 1 };
        if covered != n_systems {
            return Err(Error::InvalidState(format!(
                "system_idx covers {covered} systems but cells has {n_systems}"
            )));
        }

        Ok(Self {
            positions,
            atomic_numbers,
            cells,
            system_idx,
        })
    }

    /// Convenience constructor for a single (unbatched) system.
    pub fn single(
        positions: Vec<[f64; 3]>,
        atomic_numbers: Vec<u32>,
        cell: [[f64; 3]; 3],
        device: &Device,
    ) -> Result<Self> {
        let n_atoms = positions.len();
        let flat: Vec<f64> = positions.into_iter().flatten().collect();
        let positions = Tensor::from_vec(flat, (n_atoms, 3), device)?;
        let atomic_numbers = Tensor::from_vec(atomic_numbers, (n_atoms,), device)?;
        let cell_flat: Vec<f64> = cell.into_iter().flatten().collect();
        let cells = Tensor::from_vec(cell_flat, (1, 3, 3), device)?;
        let system_idx = Tensor::zeros((n_atoms,), DType::U32, device)?;
        Self::new(positions, atomic_numbers, cells, system_idx)
    }

    /// Total number of atoms across all member systems.
    pub fn n_atoms(&self) -> usize {
        self.positions.dims()[0]
    }

    /// Number of member systems in this state.
    pub fn n_systems(&self) -> usize {
        self.cells.dims()[0]
    }

    /// Atom positions tensor, `(n_atoms, 3)`.
    pub fn positions(&self) -> &Tensor {
        &self.positions
    }

    /// Atomic numbers tensor, `(n_atoms,)`.
    pub fn atomic_numbers(&self) -> &Tensor {
        &self.atomic_numbers
    }

    /// Unit cell matrices tensor, `(n_systems, 3, 3)`.
    pub fn cells(&self) -> &Tensor {
        &self.cells
    }

    /// Per-atom system slot tensor, `(n_atoms,)`.
    pub fn system_idx(&self) -> &Tensor {
        &self.system_idx
    }

    /// Device the state tensors live on.
    pub fn device(&self) -> &Device {
        self.positions.device()
    }

    /// Atom counts per member system, in slot order.
    pub fn atoms_per_system(&self) -> Result<Vec<usize>> {
        let idx = self.system_idx.to_vec1::<u32>()?;
        let mut counts = vec![0usize; self.n_systems()];
        for slot in idx {
            counts[slot as usize] += 1;
        }
        Ok(counts)
    }

    /// Determinant of the first member system's cell matrix.
    pub fn primary_cell_determinant(&self) -> Result<f64> {
        let cell = self.cells.narrow(0, 0, 1)?.squeeze(0)?;
        let m = cell.to_vec2::<f64>()?;
        Ok(det3(&m))
    }

    /// Replace the atom positions tensor.
    ///
    /// The caller-side engine integrates positions between scheduling
    /// rounds; shape and dtype must be unchanged.
    pub fn set_positions(&mut self, positions: Tensor) -> Result<()> {
        if positions.dims() != self.positions.dims() || positions.dtype() != DType::F64 {
            return Err(Error::InvalidState(format!(
                "replacement positions must be {:?} f64",
                self.positions.dims()
            )));
        }
        self.positions = positions;
        Ok(())
    }
}

/// 3x3 determinant by cofactor expansion.
fn det3(m: &[Vec<f64>]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Merge states into one batched state.
///
/// Members keep their relative order; `system_idx` is reassigned to
/// consecutive slots. Fails on an empty input.
pub fn merge_states(states: &[SimState]) -> Result<SimState> {
    if states.is_empty() {
        return Err(Error::InvalidState("cannot merge zero states".into()));
    }

    let positions: Vec<&Tensor> = states.iter().map(|s| &s.positions).collect();
    let atomic_numbers: Vec<&Tensor> = states.iter().map(|s| &s.atomic_numbers).collect();
    let cells: Vec<&Tensor> = states.iter().map(|s| &s.cells).collect();

    let mut idx: Vec<u32> = Vec::new();
    let mut offset = 0u32;
    for state in states {
        for slot in state.system_idx.to_vec1::<u32>()? {
            idx.push(slot + offset);
        }
        offset += state.n_systems() as u32;
    }

    let device = states[0].device();
    let n_atoms = idx.len();
    SimState::new(
        Tensor::cat(&positions, 0)?,
        Tensor::cat(&atomic_numbers, 0)?,
        Tensor::cat(&cells, 0)?,
        Tensor::from_vec(idx, (n_atoms,), device)?,
    )
}

/// Split a batched state into its member systems.
///
/// Each piece is a single-system state with `system_idx` reset to 0;
/// atomic content is unchanged.
pub fn split_state(state: &SimState) -> Result<Vec<SimState>> {
    let counts = state.atoms_per_system()?;
    let device = state.device();

    let mut members = Vec::with_capacity(counts.len());
    let mut start = 0;
    for (slot, &count) in counts.iter().enumerate() {
        let positions = state.positions.narrow(0, start, count)?;
        let atomic_numbers = state.atomic_numbers.narrow(0, start, count)?;
        let cells = state.cells.narrow(0, slot, 1)?;
        let system_idx = Tensor::zeros((count,), DType::U32, device)?;
        members.push(SimState::new(positions, atomic_numbers, cells, system_idx)?);
        start += count;
    }
    Ok(members)
}

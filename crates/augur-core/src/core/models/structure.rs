use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::BTreeMap;

/// Represents one atomic structure of the evaluation set.
///
/// A structure is the unit the harness scores: a set of atoms with known
/// species and positions, an optional periodic cell, and the reference data
/// (total energy, per-atom forces) the model predictions are compared
/// against. Reference fields are optional because a given run may evaluate
/// energies, forces, or both, depending on the saved hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// Atomic numbers, one per atom.
    pub atomic_numbers: Vec<u32>,
    /// Cartesian positions in Angstroms, one per atom.
    pub positions: Vec<Point3<f64>>,
    /// Periodic cell as three row vectors in Angstroms, if the structure is
    /// periodic along any axis.
    pub cell: Option<Matrix3<f64>>,
    /// Per-axis periodicity flags. All `false` for isolated molecules.
    pub pbc: [bool; 3],
    /// Reference total energy in eV.
    pub energy: Option<f64>,
    /// Reference forces in eV/Angstrom, one per atom.
    pub forces: Option<Vec<Vector3<f64>>>,
}

impl Structure {
    /// Creates a non-periodic structure with no reference data attached.
    pub fn new(atomic_numbers: Vec<u32>, positions: Vec<Point3<f64>>) -> Self {
        Self {
            atomic_numbers,
            positions,
            cell: None,
            pbc: [false; 3],
            energy: None,
            forces: None,
        }
    }

    /// The number of atoms in the structure.
    pub fn len(&self) -> usize {
        self.atomic_numbers.len()
    }

    /// Returns `true` if the structure contains no atoms.
    pub fn is_empty(&self) -> bool {
        self.atomic_numbers.is_empty()
    }

    /// Returns `true` if any axis of the structure is periodic.
    pub fn is_periodic(&self) -> bool {
        self.pbc.iter().any(|&p| p)
    }

    /// Counts atoms per species, ordered by atomic number.
    ///
    /// This is the raw ingredient of the compositional feature vector used
    /// for the self-contribution energy baseline.
    pub fn composition(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for &z in &self.atomic_numbers {
            *counts.entry(z).or_insert(0) += 1;
        }
        counts
    }
}

//! Neighbor graph construction.
//!
//! Each structure becomes a fixed-size neighbor graph: for every atom, the
//! displacement vectors, species and indices of its neighbors within the
//! model cutoff, padded to the maximum neighbor count across the dataset so
//! batches stack into rectangular tensors.

pub mod molecule;
pub mod neighbors;

pub use molecule::{Molecule, NeighborGraph};

use crate::core::models::species::SpeciesError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error(
        "Periodic cell is too small for cutoff {cutoff} A: minimum-image neighbor \
         search needs every periodic cell width to exceed twice the cutoff"
    )]
    CellTooSmall { cutoff: f64 },

    #[error("Structure is periodic but carries no cell")]
    MissingCell,

    #[error("Structure has no atoms")]
    EmptyStructure,

    #[error(transparent)]
    Species(#[from] SpeciesError),
}

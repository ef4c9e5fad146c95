use thiserror::Error;

use crate::core::graph::GraphError;
use crate::core::io::npy::NpyError;
use crate::core::models::species::SpeciesError;
use crate::engine::config::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Graph construction failed: {source}")]
    Graph {
        #[from]
        source: GraphError,
    },

    #[error("Checkpoint artifact could not be read: {source}")]
    Artifact {
        #[from]
        source: NpyError,
    },

    #[error("Species table error: {source}")]
    Species {
        #[from]
        source: SpeciesError,
    },

    #[error("Model error: {source}")]
    Model {
        #[from]
        source: tch::TchError,
    },

    #[error("Model output violates the contract: {0}")]
    ModelOutput(String),

    #[error("Checkpoint species table holds invalid atomic number {0}")]
    InvalidSpecies(i64),

    #[error(
        "Species table has {species} entries but {coefficients} self-contribution coefficients"
    )]
    SelfContributionMismatch {
        species: usize,
        coefficients: usize,
    },

    #[error("Structure {index} carries no reference {quantity}")]
    MissingGroundTruth {
        quantity: &'static str,
        index: usize,
    },

    #[error("Evaluation set is empty")]
    EmptyDataset,

    #[error("Augmentation count must be at least 1")]
    NoAugmentations,

    #[error("Internal logic error: {0}")]
    Internal(String),
}

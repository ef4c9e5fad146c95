use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read hyperparameter file '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse hyperparameter file '{path}': {source}", path = path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Cutoff must be positive, got {0}")]
    InvalidCutoff(f64),

    #[error("Structural batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Neither energies nor forces are enabled; nothing to evaluate")]
    NothingToEvaluate,
}

/// The hyperparameters an evaluation run depends on.
///
/// These are saved with the checkpoint at training time. Evaluation merges
/// the saved file over a defaults file, so checkpoints written before a key
/// existed still load, assuming the default value does not change the
/// semantics of what was trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypers {
    /// Neighbor cutoff radius in Angstroms.
    pub cutoff: f64,
    /// Whether the model predicts total energies.
    pub use_energies: bool,
    /// Whether the model predicts per-atom forces.
    pub use_forces: bool,
    /// Whether graphs carry extra per-atom scalar attributes.
    pub use_additional_scalar_attributes: bool,
    /// Number of structures per inference batch.
    pub structural_batch_size: usize,
}

impl Default for Hypers {
    fn default() -> Self {
        Self {
            cutoff: 5.0,
            use_energies: true,
            use_forces: true,
            use_additional_scalar_attributes: false,
            structural_batch_size: 32,
        }
    }
}

/// A partially specified hyperparameter set, as read from one YAML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialHypers {
    pub cutoff: Option<f64>,
    pub use_energies: Option<bool>,
    pub use_forces: Option<bool>,
    pub use_additional_scalar_attributes: Option<bool>,
    pub structural_batch_size: Option<usize>,
}

impl PartialHypers {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Hypers {
    /// Loads the hyperparameters of a checkpoint: the saved file wins over
    /// the defaults file, and keys absent from both take the built-in
    /// default.
    pub fn load_merged(saved_path: &Path, defaults_path: &Path) -> Result<Self, ConfigError> {
        let saved = PartialHypers::from_file(saved_path)?;
        let defaults = PartialHypers::from_file(defaults_path)?;
        debug!(?saved, ?defaults, "Merging hyperparameters.");
        Self::resolve(saved, defaults)
    }

    /// Resolves the merge precedence and validates the result.
    pub fn resolve(saved: PartialHypers, defaults: PartialHypers) -> Result<Self, ConfigError> {
        let fallback = Hypers::default();
        let hypers = Hypers {
            cutoff: saved.cutoff.or(defaults.cutoff).unwrap_or(fallback.cutoff),
            use_energies: saved
                .use_energies
                .or(defaults.use_energies)
                .unwrap_or(fallback.use_energies),
            use_forces: saved
                .use_forces
                .or(defaults.use_forces)
                .unwrap_or(fallback.use_forces),
            use_additional_scalar_attributes: saved
                .use_additional_scalar_attributes
                .or(defaults.use_additional_scalar_attributes)
                .unwrap_or(fallback.use_additional_scalar_attributes),
            structural_batch_size: saved
                .structural_batch_size
                .or(defaults.structural_batch_size)
                .unwrap_or(fallback.structural_batch_size),
        };
        hypers.validate()?;
        Ok(hypers)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cutoff > 0.0) {
            return Err(ConfigError::InvalidCutoff(self.cutoff));
        }
        if self.structural_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if !self.use_energies && !self.use_forces {
            return Err(ConfigError::NothingToEvaluate);
        }
        Ok(())
    }
}

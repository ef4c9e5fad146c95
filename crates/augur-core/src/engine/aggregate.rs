use crate::core::models::species::SpeciesTable;
use crate::core::models::structure::Structure;
use crate::engine::error::EngineError;
use crate::engine::model::Prediction;
use nalgebra::Vector3;

/// Accumulates predictions across augmentation passes.
///
/// Each pass contributes one full sweep over the dataset; the mean over
/// passes is the estimate the metrics are computed from.
#[derive(Debug)]
pub struct PredictionAccumulator {
    energies: Vec<f64>,
    forces: Vec<Vector3<f64>>,
    n_structures: usize,
    n_atoms: usize,
    use_energies: bool,
    use_forces: bool,
    passes: usize,
}

impl PredictionAccumulator {
    pub fn new(n_structures: usize, n_atoms: usize, use_energies: bool, use_forces: bool) -> Self {
        Self {
            energies: vec![0.0; if use_energies { n_structures } else { 0 }],
            forces: vec![Vector3::zeros(); if use_forces { n_atoms } else { 0 }],
            n_structures,
            n_atoms,
            use_energies,
            use_forces,
            passes: 0,
        }
    }

    /// Adds one augmentation pass: the concatenated predictions of every
    /// batch, in dataset order.
    pub fn add_pass(
        &mut self,
        energies: &[f64],
        forces: &[Vector3<f64>],
    ) -> Result<(), EngineError> {
        if self.use_energies && energies.len() != self.n_structures {
            return Err(EngineError::Internal(format!(
                "augmentation pass produced {} energies for {} structures",
                energies.len(),
                self.n_structures
            )));
        }
        if self.use_forces && forces.len() != self.n_atoms {
            return Err(EngineError::Internal(format!(
                "augmentation pass produced {} force vectors for {} atoms",
                forces.len(),
                self.n_atoms
            )));
        }
        if self.use_energies {
            for (sum, value) in self.energies.iter_mut().zip(energies) {
                *sum += value;
            }
        }
        if self.use_forces {
            for (sum, value) in self.forces.iter_mut().zip(forces) {
                *sum += value;
            }
        }
        self.passes += 1;
        Ok(())
    }

    /// The mean prediction over all accumulated passes.
    pub fn into_mean(self) -> Result<MeanPrediction, EngineError> {
        if self.passes == 0 {
            return Err(EngineError::Internal(
                "no augmentation passes were accumulated".to_string(),
            ));
        }
        let scale = 1.0 / self.passes as f64;
        Ok(MeanPrediction {
            energies: self.energies.iter().map(|e| e * scale).collect(),
            forces: self.forces.iter().map(|f| f * scale).collect(),
        })
    }
}

/// Predictions averaged over augmentations.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanPrediction {
    pub energies: Vec<f64>,
    pub forces: Vec<Vector3<f64>>,
}

/// Per-structure self-contribution baselines: the compositional feature
/// vector dotted with the per-species coefficients saved alongside the
/// checkpoint. Added back to mean predicted energies before metrics, since
/// the model was trained on energies with this baseline removed.
pub fn self_contribution_energies(
    structures: &[Structure],
    species: &SpeciesTable,
    coefficients: &[f64],
) -> Result<Vec<f64>, EngineError> {
    if coefficients.len() != species.len() {
        return Err(EngineError::SelfContributionMismatch {
            species: species.len(),
            coefficients: coefficients.len(),
        });
    }
    structures
        .iter()
        .map(|structure| {
            let features = species.compositional_features(structure)?;
            Ok(features
                .iter()
                .zip(coefficients)
                .map(|(count, coefficient)| count * coefficient)
                .sum())
        })
        .collect()
}

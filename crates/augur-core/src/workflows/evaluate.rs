use crate::core::graph::{Molecule, NeighborGraph};
use crate::core::io::npy;
use crate::core::metrics;
use crate::core::models::species::SpeciesTable;
use crate::core::models::structure::Structure;
use crate::engine::aggregate::{self, MeanPrediction, PredictionAccumulator};
use crate::engine::augment::random_rotation;
use crate::engine::batch::{GraphBatch, make_batches};
use crate::engine::config::Hypers;
use crate::engine::error::EngineError;
use crate::engine::model::PotentialModel;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::Vector3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Everything one evaluation run needs beyond the structures themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationConfig {
    /// Hyperparameters merged from the checkpoint's saved file and the
    /// defaults file.
    pub hypers: Hypers,
    /// The TorchScript archive inside the checkpoint folder.
    pub model_path: PathBuf,
    /// `all_species.npy` inside the checkpoint folder.
    pub species_path: PathBuf,
    /// `self_contributions.npy` inside the checkpoint folder.
    pub self_contributions_path: PathBuf,
    /// Number of random-orientation passes to average over.
    pub augmentations: usize,
    /// Structures per inference batch.
    pub batch_size: usize,
    /// RNG seed for orientation sampling; `None` draws from entropy.
    pub seed: Option<u64>,
}

/// The outcome of an evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub n_structures: usize,
    pub n_atoms: usize,
    pub augmentations: usize,
    /// Energy metrics in eV; `None` when energies were disabled.
    pub energy_mae: Option<f64>,
    pub energy_rmse: Option<f64>,
    /// Per-component force metrics in eV/Angstrom; `None` when forces were
    /// disabled.
    pub force_mae: Option<f64>,
    pub force_rmse: Option<f64>,
}

#[instrument(skip_all, name = "evaluation_workflow")]
pub fn run(
    structures: &[Structure],
    config: &EvaluationConfig,
    reporter: &ProgressReporter,
) -> Result<EvaluationReport, EngineError> {
    if structures.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    if config.augmentations == 0 {
        return Err(EngineError::NoAugmentations);
    }
    let hypers = &config.hypers;
    let n_atoms: usize = structures.iter().map(Structure::len).sum();

    // === Phase 0: Load the checkpoint artifacts ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    info!(
        n_structures = structures.len(),
        n_atoms, "Loading checkpoint artifacts."
    );

    let species = load_species_table(config)?;
    let self_contributions = if hypers.use_energies {
        let coefficients = npy::read_f64_1d_from_path(&config.self_contributions_path)?;
        if coefficients.len() != species.len() {
            return Err(EngineError::SelfContributionMismatch {
                species: species.len(),
                coefficients: coefficients.len(),
            });
        }
        Some(coefficients)
    } else {
        None
    };
    let model = PotentialModel::load(&config.model_path, hypers)?;

    let ground_truth = collect_ground_truth(structures, hypers)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Build graphs and batches ===
    let batches = build_batches(structures, config, &species, reporter)?;

    // === Phase 2: Augmented inference ===
    let mean = run_augmented_inference(&model, &batches, structures.len(), n_atoms, config, reporter)?;

    // === Phase 3: Aggregate and score ===
    reporter.report(Progress::PhaseStart {
        name: "Aggregation",
    });
    let report = score(
        structures,
        &species,
        self_contributions.as_deref(),
        &ground_truth,
        mean,
        config,
    )?;
    reporter.report(Progress::PhaseFinish);

    info!(
        energy_mae = report.energy_mae,
        energy_rmse = report.energy_rmse,
        force_mae = report.force_mae,
        force_rmse = report.force_rmse,
        "Evaluation complete."
    );
    Ok(report)
}

fn load_species_table(config: &EvaluationConfig) -> Result<SpeciesTable, EngineError> {
    let raw = npy::read_i64_1d_from_path(&config.species_path)?;
    let species = raw
        .iter()
        .map(|&z| to_atomic_number(z))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SpeciesTable::new(species)?)
}

fn to_atomic_number(z: i64) -> Result<u32, EngineError> {
    match z {
        1..=118 => Ok(z as u32),
        other => Err(EngineError::InvalidSpecies(other)),
    }
}

/// Reference data pulled out of the structures up front, so a structure
/// missing its labels fails the run before any inference happens.
struct GroundTruth {
    energies: Option<Vec<f64>>,
    force_components: Option<Vec<f64>>,
}

fn collect_ground_truth(
    structures: &[Structure],
    hypers: &Hypers,
) -> Result<GroundTruth, EngineError> {
    let energies = if hypers.use_energies {
        Some(
            structures
                .iter()
                .enumerate()
                .map(|(index, s)| {
                    s.energy.ok_or(EngineError::MissingGroundTruth {
                        quantity: "energy",
                        index,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        )
    } else {
        None
    };

    let force_components = if hypers.use_forces {
        let mut components = Vec::new();
        for (index, s) in structures.iter().enumerate() {
            let forces = s.forces.as_ref().ok_or(EngineError::MissingGroundTruth {
                quantity: "forces",
                index,
            })?;
            for f in forces {
                components.extend_from_slice(&[f.x, f.y, f.z]);
            }
        }
        Some(components)
    } else {
        None
    };

    Ok(GroundTruth {
        energies,
        force_components,
    })
}

fn build_batches(
    structures: &[Structure],
    config: &EvaluationConfig,
    species: &SpeciesTable,
    reporter: &ProgressReporter,
) -> Result<Vec<GraphBatch>, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Graph Construction",
    });
    reporter.report(Progress::TaskStart {
        total_steps: structures.len() as u64,
    });

    let cutoff = config.hypers.cutoff;

    #[cfg(not(feature = "parallel"))]
    let iterator = structures.iter();

    #[cfg(feature = "parallel")]
    let iterator = structures.par_iter();

    let molecules: Vec<Molecule> = iterator
        .map(|structure| {
            let molecule = Molecule::build(structure, cutoff, species);
            reporter.report(Progress::TaskIncrement);
            molecule
        })
        .collect::<Result<_, _>>()?;
    reporter.report(Progress::TaskFinish);

    // The padding width is shared across the whole dataset so every batch
    // stacks into tensors of the same trailing shape.
    let max_num = molecules
        .iter()
        .map(Molecule::max_neighbors)
        .max()
        .unwrap_or(0);
    info!(max_num, "Padding graphs to the dataset-wide neighbor count.");

    let graphs: Vec<NeighborGraph> = molecules
        .iter()
        .map(|molecule| molecule.to_graph(max_num))
        .collect();
    let batches = make_batches(&graphs, config.batch_size);

    info!(
        batches = batches.len(),
        batch_size = config.batch_size,
        "Batched the evaluation set."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(batches)
}

fn run_augmented_inference(
    model: &PotentialModel,
    batches: &[GraphBatch],
    n_structures: usize,
    n_atoms: usize,
    config: &EvaluationConfig,
    reporter: &ProgressReporter,
) -> Result<MeanPrediction, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Inference" });
    reporter.report(Progress::TaskStart {
        total_steps: (config.augmentations * batches.len()) as u64,
    });

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let hypers = &config.hypers;
    let mut accumulator = PredictionAccumulator::new(
        n_structures,
        n_atoms,
        hypers.use_energies,
        hypers.use_forces,
    );

    for pass in 0..config.augmentations {
        reporter.report(Progress::StatusUpdate {
            text: format!("Augmentation {}/{}", pass + 1, config.augmentations),
        });
        let orientation = random_rotation(&mut rng);

        let mut pass_energies = Vec::with_capacity(n_structures);
        let mut pass_forces: Vec<Vector3<f64>> = Vec::with_capacity(n_atoms);
        for batch in batches {
            let prediction = model.predict(batch, &orientation)?;
            pass_energies.extend(prediction.energies);
            pass_forces.extend(prediction.forces);
            reporter.report(Progress::TaskIncrement);
        }
        accumulator.add_pass(&pass_energies, &pass_forces)?;
    }

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    accumulator.into_mean()
}

fn score(
    structures: &[Structure],
    species: &SpeciesTable,
    self_contributions: Option<&[f64]>,
    ground_truth: &GroundTruth,
    mean: MeanPrediction,
    config: &EvaluationConfig,
) -> Result<EvaluationReport, EngineError> {
    let n_atoms: usize = structures.iter().map(Structure::len).sum();
    let mut report = EvaluationReport {
        n_structures: structures.len(),
        n_atoms,
        augmentations: config.augmentations,
        energy_mae: None,
        energy_rmse: None,
        force_mae: None,
        force_rmse: None,
    };

    if let (Some(reference), Some(coefficients)) =
        (ground_truth.energies.as_ref(), self_contributions)
    {
        let baselines = aggregate::self_contribution_energies(structures, species, coefficients)?;
        let predicted: Vec<f64> = mean
            .energies
            .iter()
            .zip(&baselines)
            .map(|(energy, baseline)| energy + baseline)
            .collect();
        report.energy_mae = Some(metrics::mae(reference, &predicted));
        report.energy_rmse = Some(metrics::rmse(reference, &predicted));
    }

    if let Some(reference) = ground_truth.force_components.as_ref() {
        let predicted: Vec<f64> = mean
            .forces
            .iter()
            .flat_map(|f| [f.x, f.y, f.z])
            .collect();
        report.force_mae = Some(metrics::mae(reference, &predicted));
        report.force_rmse = Some(metrics::rmse(reference, &predicted));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::Prediction;
    use nalgebra::Point3;

    fn config(augmentations: usize) -> EvaluationConfig {
        EvaluationConfig {
            hypers: Hypers::default(),
            model_path: PathBuf::from("model.pt"),
            species_path: PathBuf::from("all_species.npy"),
            self_contributions_path: PathBuf::from("self_contributions.npy"),
            augmentations,
            batch_size: 4,
            seed: Some(1),
        }
    }

    fn labelled_structure() -> Structure {
        let mut s = Structure::new(
            vec![1, 1],
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.74, 0.0, 0.0)],
        );
        s.energy = Some(-31.7);
        s.forces = Some(vec![
            Vector3::new(0.1, 0.0, 0.0),
            Vector3::new(-0.1, 0.0, 0.0),
        ]);
        s
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let reporter = ProgressReporter::new();
        assert!(matches!(
            run(&[], &config(2), &reporter),
            Err(EngineError::EmptyDataset)
        ));
    }

    #[test]
    fn zero_augmentations_are_rejected() {
        let reporter = ProgressReporter::new();
        let structures = vec![labelled_structure()];
        assert!(matches!(
            run(&structures, &config(0), &reporter),
            Err(EngineError::NoAugmentations)
        ));
    }

    #[test]
    fn missing_reference_energy_fails_before_inference() {
        let mut s = labelled_structure();
        s.energy = None;
        let err = collect_ground_truth(&[s], &Hypers::default()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingGroundTruth {
                quantity: "energy",
                index: 0
            }
        ));
    }

    #[test]
    fn ground_truth_forces_are_flattened_per_component() {
        let truth = collect_ground_truth(&[labelled_structure()], &Hypers::default()).unwrap();
        assert_eq!(
            truth.force_components.unwrap(),
            vec![0.1, 0.0, 0.0, -0.1, 0.0, 0.0]
        );
        assert_eq!(truth.energies.unwrap(), vec![-31.7]);
    }

    #[test]
    fn score_adds_the_self_contribution_baseline() {
        let structures = vec![labelled_structure()];
        let species = SpeciesTable::new(vec![1]).unwrap();
        let truth = collect_ground_truth(&structures, &Hypers::default()).unwrap();
        // Model predicts the residual after the baseline was removed.
        let mean = MeanPrediction {
            energies: vec![-31.7 - 2.0 * -15.0],
            forces: vec![
                Vector3::new(0.1, 0.0, 0.0),
                Vector3::new(-0.1, 0.0, 0.0),
            ],
        };

        let report = score(
            &structures,
            &species,
            Some(&[-15.0]),
            &truth,
            mean,
            &config(1),
        )
        .unwrap();

        assert!(report.energy_mae.unwrap().abs() < 1e-12);
        assert!(report.energy_rmse.unwrap().abs() < 1e-12);
        assert_eq!(report.force_mae, Some(0.0));
        assert_eq!(report.force_rmse, Some(0.0));
    }

    #[test]
    fn accumulator_and_score_compose_over_passes() {
        let structures = vec![labelled_structure()];
        let species = SpeciesTable::new(vec![1]).unwrap();
        let truth = collect_ground_truth(&structures, &Hypers::default()).unwrap();

        let mut acc = PredictionAccumulator::new(1, 2, true, true);
        for energies in [[1.0], [3.0]] {
            let prediction = Prediction {
                energies: energies.to_vec(),
                forces: vec![Vector3::zeros(), Vector3::zeros()],
            };
            acc.add_pass(&prediction.energies, &prediction.forces).unwrap();
        }
        let mean = acc.into_mean().unwrap();
        assert_eq!(mean.energies, vec![2.0]);

        let report = score(&structures, &species, Some(&[0.0]), &truth, mean, &config(2)).unwrap();
        // |(-31.7) - 2.0|
        assert!((report.energy_mae.unwrap() - 33.7).abs() < 1e-12);
    }

    #[test]
    fn species_entries_outside_the_periodic_table_are_rejected() {
        assert_eq!(to_atomic_number(14).unwrap(), 14);
        assert!(matches!(
            to_atomic_number(-3),
            Err(EngineError::InvalidSpecies(-3))
        ));
        assert!(matches!(
            to_atomic_number(0),
            Err(EngineError::InvalidSpecies(0))
        ));
    }
}

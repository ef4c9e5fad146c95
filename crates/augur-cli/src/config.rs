use crate::cli::EvalArgs;
use crate::error::{CliError, Result};
use augur::engine::config::Hypers;
use augur::workflows::evaluate::EvaluationConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const HYPERS_FILE: &str = "hypers_used.yaml";
const SPECIES_FILE: &str = "all_species.npy";
const SELF_CONTRIBUTIONS_FILE: &str = "self_contributions.npy";

/// The fully resolved configuration of one CLI invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub structures_path: PathBuf,
    pub eval: EvaluationConfig,
}

/// Resolves the checkpoint folder layout and merges hyperparameters.
///
/// Precedence: CLI flags beat the checkpoint's saved hypers, which beat the
/// defaults file. Artifact paths are checked up front so a malformed
/// checkpoint folder fails before any work happens.
pub fn build_config(args: &EvalArgs) -> Result<AppConfig> {
    let hypers_path = args.checkpoint_dir.join(HYPERS_FILE);
    let hypers = Hypers::load_merged(&hypers_path, &args.defaults)
        .map_err(|e| CliError::Config(e.to_string()))?;
    debug!(?hypers, "Merged hyperparameters.");

    if args.augmentations == 0 {
        return Err(CliError::Argument(
            "--augmentations must be at least 1".to_string(),
        ));
    }
    let batch_size = match args.batch_size {
        Some(0) => {
            return Err(CliError::Argument(
                "--batch-size must be at least 1".to_string(),
            ));
        }
        Some(n) => n,
        None => hypers.structural_batch_size,
    };

    let model_path = args
        .checkpoint_dir
        .join(format!("{}.pt", args.checkpoint));
    let species_path = args.checkpoint_dir.join(SPECIES_FILE);
    let self_contributions_path = args.checkpoint_dir.join(SELF_CONTRIBUTIONS_FILE);

    require_file(&args.structures, "structures file")?;
    require_file(&model_path, "scripted model")?;
    require_file(&species_path, "species table")?;
    if hypers.use_energies {
        require_file(&self_contributions_path, "self-contribution coefficients")?;
    }

    info!(
        checkpoint = %model_path.display(),
        batch_size,
        augmentations = args.augmentations,
        "Resolved evaluation configuration."
    );

    Ok(AppConfig {
        structures_path: args.structures.clone(),
        eval: EvaluationConfig {
            hypers,
            model_path,
            species_path,
            self_contributions_path,
            augmentations: args.augmentations,
            batch_size,
            seed: args.seed,
        },
    })
}

fn require_file(path: &Path, kind: &str) -> Result<()> {
    if !path.is_file() {
        return Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Missing {}: {}", kind, path.display()),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    fn setup_checkpoint_dir(saved_hypers: &str) -> (TempDir, EvalArgs) {
        let tmp = tempdir().expect("create temp dir");
        let dir = tmp.path().to_path_buf();

        fs::write(dir.join(HYPERS_FILE), saved_hypers).unwrap();
        fs::write(dir.join("best_val.pt"), b"scripted").unwrap();
        fs::write(dir.join(SPECIES_FILE), b"npy").unwrap();
        fs::write(dir.join(SELF_CONTRIBUTIONS_FILE), b"npy").unwrap();
        fs::write(dir.join("defaults.yaml"), "structural_batch_size: 16\n").unwrap();
        fs::write(dir.join("test.xyz"), "1\ncomment\nH 0 0 0\n").unwrap();

        let args = EvalArgs {
            structures: dir.join("test.xyz"),
            checkpoint_dir: dir.clone(),
            checkpoint: "best_val".to_string(),
            augmentations: 4,
            defaults: dir.join("defaults.yaml"),
            batch_size: None,
            seed: None,
        };
        (tmp, args)
    }

    #[test]
    fn build_config_resolves_checkpoint_layout() {
        let (tmp, args) = setup_checkpoint_dir("cutoff: 4.0\n");
        let app = build_config(&args).expect("build ok");

        assert_eq!(app.eval.hypers.cutoff, 4.0);
        assert_eq!(app.eval.model_path, tmp.path().join("best_val.pt"));
        assert_eq!(app.eval.species_path, tmp.path().join(SPECIES_FILE));
        // No --batch-size flag: the merged hypers decide.
        assert_eq!(app.eval.batch_size, 16);
        assert_eq!(app.eval.augmentations, 4);
    }

    #[test]
    fn saved_hypers_beat_the_defaults_file() {
        let (_tmp, args) = setup_checkpoint_dir("structural_batch_size: 2\n");
        let app = build_config(&args).expect("build ok");
        assert_eq!(app.eval.batch_size, 2);
    }

    #[test]
    fn batch_size_flag_beats_saved_hypers() {
        let (_tmp, mut args) = setup_checkpoint_dir("structural_batch_size: 2\n");
        args.batch_size = Some(64);
        let app = build_config(&args).expect("build ok");
        assert_eq!(app.eval.batch_size, 64);
    }

    #[test]
    fn zero_augmentations_are_an_argument_error() {
        let (_tmp, mut args) = setup_checkpoint_dir("cutoff: 4.0\n");
        args.augmentations = 0;
        assert!(matches!(
            build_config(&args),
            Err(CliError::Argument(_))
        ));
    }

    #[test]
    fn missing_model_file_is_reported() {
        let (_tmp, mut args) = setup_checkpoint_dir("cutoff: 4.0\n");
        args.checkpoint = "no_such_checkpoint".to_string();
        assert!(matches!(build_config(&args), Err(CliError::Io(_))));
    }

    #[test]
    fn missing_hypers_file_is_a_config_error() {
        let (_tmp, mut args) = setup_checkpoint_dir("cutoff: 4.0\n");
        args.checkpoint_dir = PathBuf::from("/nonexistent/checkpoint");
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));
    }

    #[test]
    fn self_contributions_are_optional_without_energies() {
        let (tmp, args) = setup_checkpoint_dir("use_energies: false\nuse_forces: true\n");
        fs::remove_file(tmp.path().join(SELF_CONTRIBUTIONS_FILE)).unwrap();
        let app = build_config(&args).expect("build ok");
        assert!(!app.eval.hypers.use_energies);
    }
}

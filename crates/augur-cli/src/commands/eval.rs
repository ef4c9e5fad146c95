use crate::cli::EvalArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use augur::{
    core::io::{traits::StructureFile, xyz::ExtXyzFile},
    engine::progress::ProgressReporter,
    workflows,
};
use tracing::info;

pub async fn run(args: EvalArgs) -> Result<()> {
    let app = config::build_config(&args)?;

    info!("Loading structures from {:?}", &app.structures_path);
    let structures =
        ExtXyzFile::read_from_path(&app.structures_path).map_err(|e| CliError::FileParsing {
            path: app.structures_path.clone(),
            source: e.into(),
        })?;
    let n_atoms: usize = structures.iter().map(|s| s.len()).sum();
    println!(
        "Evaluating {} structures ({} atoms, {} augmentation passes)...",
        structures.len(),
        n_atoms,
        app.eval.augmentations
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the core evaluation workflow...");
    let report =
        tokio::task::block_in_place(|| workflows::evaluate::run(&structures, &app.eval, &reporter))?;

    if let (Some(mae), Some(rmse)) = (report.energy_mae, report.energy_rmse) {
        println!("energies mae: {}", mae);
        println!("energies rmse: {}", rmse);
    }
    if let (Some(mae), Some(rmse)) = (report.force_mae, report.force_rmse) {
        println!("forces mae per component: {}", mae);
        println!("forces rmse per component: {}", rmse);
    }

    Ok(())
}

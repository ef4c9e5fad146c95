use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Augur CLI - Evaluates pretrained graph-neural-network interatomic potentials \
             on held-out structures, averaging over test-time rotational augmentations.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel graph construction.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score a checkpoint against a held-out structure set.
    Eval(EvalArgs),
}

/// Arguments for the `eval` subcommand.
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Path to the evaluation structures (multi-frame extended XYZ).
    #[arg(required = true, value_name = "STRUCTURES")]
    pub structures: PathBuf,

    /// Checkpoint folder holding hypers_used.yaml, the scripted model and
    /// the species/self-contribution arrays.
    #[arg(short = 'c', long, required = true, value_name = "DIR")]
    pub checkpoint_dir: PathBuf,

    /// Checkpoint name; the model is loaded from <DIR>/<NAME>.pt.
    #[arg(short = 'k', long, required = true, value_name = "NAME")]
    pub checkpoint: String,

    /// Number of random-orientation augmentation passes to average over.
    #[arg(short = 'n', long, required = true, value_name = "INT")]
    pub augmentations: usize,

    /// Path to the default hyperparameters file. Keys missing from the
    /// checkpoint's saved hypers fall back to these values.
    #[arg(short = 'd', long, required = true, value_name = "PATH")]
    pub defaults: PathBuf,

    /// Structures per inference batch. Defaults to the checkpoint's saved
    /// structural batch size.
    #[arg(short = 'b', long, value_name = "INT")]
    pub batch_size: Option<usize>,

    /// Seed for orientation sampling, for reproducible runs.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,
}

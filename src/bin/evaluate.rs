//! Evaluation stage: score the model on the held-out subset.

use clap::Parser;
use std::path::PathBuf;
use trueno_pipeline::config::PipelineConfig;
use trueno_pipeline::{cli, stages};

/// Compute MSE and R² of a saved model on a test CSV
#[derive(Debug, Parser)]
#[command(name = "evaluate")]
struct Args {
    /// Model artifact written by `train`
    model_path: PathBuf,
    /// Held-out subset
    test_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    cli::init_tracing();
    let args: Args = cli::parse_or_exit("evaluate <model_path> <test_path>");
    let config = PipelineConfig::from_env();

    let report = stages::evaluate::run(&args.model_path, &args.test_path, &config)?;
    println!("{report}");
    Ok(())
}

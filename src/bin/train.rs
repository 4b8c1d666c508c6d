//! Training stage: fit the random forest and save the model artifact.

use clap::Parser;
use std::path::PathBuf;
use trueno_pipeline::config::PipelineConfig;
use trueno_pipeline::{cli, stages};

/// Fit a random forest regressor on a training CSV
#[derive(Debug, Parser)]
#[command(name = "train")]
struct Args {
    /// Training subset
    train_path: PathBuf,
    /// Model artifact output
    model_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    cli::init_tracing();
    let args: Args = cli::parse_or_exit("train <train_path> <model_path>");
    let config = PipelineConfig::from_env();

    let report = stages::train::run(&args.train_path, &args.model_path, &config)?;
    tracing::debug!(run_id = %report.run_id, rows = report.n_samples, "training complete");
    println!("Model trained and saved to {}", args.model_path.display());
    Ok(())
}

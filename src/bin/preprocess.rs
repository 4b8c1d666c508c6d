//! Preprocessing stage: deterministic 80/20 train/test split.

use clap::Parser;
use std::path::PathBuf;
use trueno_pipeline::{cli, stages};

/// Split a dataset into training and held-out CSV files
#[derive(Debug, Parser)]
#[command(name = "preprocess")]
struct Args {
    /// Input CSV with a `target` column
    input_path: PathBuf,
    /// Training subset output
    train_out: PathBuf,
    /// Held-out subset output
    test_out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    cli::init_tracing();
    let args: Args = cli::parse_or_exit("preprocess <input_path> <train_out> <test_out>");

    let report = stages::preprocess::run(&args.input_path, &args.train_out, &args.test_out)?;
    println!(
        "✅ Preprocessing done. Train shape: ({}, {}), Test shape: ({}, {})",
        report.n_train, report.n_columns, report.n_test, report.n_columns
    );
    Ok(())
}

//! Data loader stage: resolve a versioned data path and write it as CSV.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use trueno_pipeline::{cli, stages};

/// Resolve a tracked dataset and copy it to a CSV file
#[derive(Debug, Parser)]
#[command(name = "load_data")]
struct Args {
    /// Logical data path, resolved through the data repository
    data_path: String,
    /// Destination CSV file
    output_path: PathBuf,
}

fn main() -> ExitCode {
    cli::init_tracing();
    let args: Args = cli::parse_or_exit("load_data <data_path> <output_path>");

    match stages::load_data::run(&args.data_path, &args.output_path) {
        Ok(report) => {
            tracing::debug!(rows = report.rows, source = %report.source.display(), "load complete");
            println!("✅ Data loaded to {}", args.output_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Error loading data: {e}");
            ExitCode::FAILURE
        }
    }
}

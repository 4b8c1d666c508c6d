//! Materialize the reference dataset into `data/raw_data.csv` and track it.

use anyhow::Context;
use clap::Parser;
use trueno_pipeline::cli;
use trueno_pipeline::dataset::reference;
use trueno_pipeline::versioning::VersionedRepo;

/// Write the reference diabetes dataset to data/raw_data.csv
#[derive(Debug, Parser)]
#[command(name = "generate_data")]
struct Args {}

fn main() -> anyhow::Result<()> {
    cli::init_tracing();
    let _args: Args = cli::parse_or_exit("generate_data");

    let cwd = std::env::current_dir()?;
    let path = reference::materialize(&cwd)?;

    let repo = VersionedRepo::discover(&cwd);
    let logical = path
        .strip_prefix(repo.root())
        .context("dataset was written outside the data repository")?
        .to_string_lossy()
        .replace('\\', "/");
    let md5 = repo.track(&logical)?;

    tracing::debug!(rows = reference::N_SAMPLES, %md5, "tracked reference dataset");
    println!("✅ Success: {logical} created using the Diabetes dataset.");
    Ok(())
}

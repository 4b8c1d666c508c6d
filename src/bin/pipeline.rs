//! Orchestrator: run load_data, preprocess, train and evaluate in order,
//! stopping at the first failure.

use clap::Parser;
use std::path::Path;
use trueno_pipeline::cli;
use trueno_pipeline::config::{PipelineConfig, PipelineLayout};
use trueno_pipeline::orchestrator::{Pipeline, ProcessRunner, Stage, StageEvent};

/// Run the full training pipeline in the current directory
#[derive(Debug, Parser)]
#[command(name = "pipeline")]
struct Args {}

const fn title(stage: Stage) -> &'static str {
    match stage {
        Stage::LoadData => "Step 1: Load Data",
        Stage::Preprocess => "Step 2: Preprocess",
        Stage::Train => "Step 3: Train",
        Stage::Evaluate => "Step 4: Evaluate",
    }
}

fn main() -> anyhow::Result<()> {
    cli::init_tracing();
    let _args: Args = cli::parse_or_exit("pipeline");

    let config = PipelineConfig::from_env();
    let cwd = std::env::current_dir()?;
    let pipeline = Pipeline::new(PipelineLayout::under(Path::new("")), config);
    let mut runner = ProcessRunner::beside_current_exe(cwd)?;

    println!("🚀 Starting Pipeline...");
    let report = pipeline.run(&mut runner, |event| match event {
        StageEvent::Starting(stage) => println!("\n--- {} ---", title(stage)),
        StageEvent::Finished(outcome) => {
            print!("{}", outcome.stdout);
            if !outcome.success() {
                eprint!("{}", outcome.stderr);
            }
        }
    })?;
    report.into_result()?;

    println!("\n✅ Pipeline Completed Successfully!");
    Ok(())
}

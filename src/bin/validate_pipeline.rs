//! Validator: static checks of the project layout, exit 0 only if all pass.

use clap::Parser;
use std::process::ExitCode;
use trueno_pipeline::config::PipelineConfig;
use trueno_pipeline::{cli, validate};

/// Check that the pipeline project is complete
#[derive(Debug, Parser)]
#[command(name = "validate_pipeline")]
struct Args {}

fn main() -> anyhow::Result<ExitCode> {
    cli::init_tracing();
    let _args: Args = cli::parse_or_exit("validate_pipeline");

    let rule = "=".repeat(60);
    println!("{rule}\nPipeline Validation\n{rule}");

    let root = std::env::current_dir()?;
    let report = validate::run_checks(&root, &PipelineConfig::from_env());
    for check in report.checks() {
        println!("{check}");
    }

    println!("\n{rule}");
    let code = match report.into_result() {
        Ok(_) => {
            println!("✅ VALIDATION PASSED - Pipeline is ready!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("VALIDATION FAILED - {e}");
            ExitCode::FAILURE
        }
    };
    println!("{rule}");
    Ok(code)
}

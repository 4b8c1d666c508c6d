//! # Trueno-Pipeline: Linear ML Training Pipeline
//!
//! **Version**: 0.1.0
//!
//! Trueno-Pipeline loads a versioned tabular dataset, splits it
//! deterministically, fits a random forest regressor, evaluates it on the
//! held-out rows and records every step in an experiment tracker.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌─────────┐   ┌──────────┐
//! │ load_data │──>│ preprocess │──>│  train  │──>│ evaluate │
//! └─────┬─────┘   └────────────┘   └────┬────┘   └────┬─────┘
//!       │ versioning                    │ tracking    │ tracking
//!       v                               v             v
//!   .dvc cache                  MLflow server / file store
//! ```
//!
//! Each stage is a separate binary; the `pipeline` binary runs them in
//! order and stops at the first non-zero exit. Stages share nothing but
//! files.
//!
//! ## Design Principles
//!
//! - **Explicit configuration**: tracking URI and experiment name travel in
//!   a [`config::PipelineConfig`], never in ambient globals
//! - **Typed stage boundary**: every dataset is checked against a
//!   [`dataset::DatasetSchema`] before use
//! - **Reproducibility**: split and forest are seeded; the same input
//!   gives byte-identical outputs
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use trueno_pipeline::config::PipelineConfig;
//! use trueno_pipeline::stages;
//!
//! let config = PipelineConfig::from_env();
//! stages::load_data::run("data/raw_data.csv", Path::new("data/extracted.csv"))?;
//! stages::preprocess::run(
//!     Path::new("data/extracted.csv"),
//!     Path::new("data/train.csv"),
//!     Path::new("data/test.csv"),
//! )?;
//! stages::train::run(Path::new("data/train.csv"), Path::new("data/model.bin"), &config)?;
//! let report = stages::evaluate::run(
//!     Path::new("data/model.bin"),
//!     Path::new("data/test.csv"),
//!     &config,
//! )?;
//! println!("{report}");
//! # Ok::<(), trueno_pipeline::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod stages;
pub mod tracking;
pub mod validate;
pub mod versioning;

pub use error::{Error, Result};

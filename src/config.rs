//! Pipeline configuration
//!
//! The tracking endpoint and experiment name are fixed once, at
//! orchestrator start, and handed to every stage explicitly. Split ratio,
//! seeds and forest size are constants with no override surface.

use std::path::{Path, PathBuf};

/// Environment variable carrying the tracking URI to child stages
pub const TRACKING_URI_ENV: &str = "MLFLOW_TRACKING_URI";

/// Environment variable carrying the experiment name to child stages
pub const EXPERIMENT_NAME_ENV: &str = "MLFLOW_EXPERIMENT_NAME";

/// Tracking server the pipeline reports to unless overridden
pub const DEFAULT_TRACKING_URI: &str = "http://127.0.0.1:62686";

/// Experiment every run is filed under unless overridden
pub const DEFAULT_EXPERIMENT_NAME: &str = "diabetes_pipeline";

/// Name of the label column in every stage file
pub const TARGET_COLUMN: &str = "target";

/// Fraction of rows held out for evaluation
pub const TEST_FRACTION: f64 = 0.2;

/// Seed of the train/test permutation
pub const SPLIT_SEED: u64 = 42;

/// Number of trees in the forest
pub const N_ESTIMATORS: usize = 100;

/// Seed of the forest's bootstrap and tree randomness
pub const FOREST_SEED: u64 = 42;

/// Explicit configuration handed to each stage entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Tracking backend URI (`http(s)://`, `file:` or a bare path)
    pub tracking_uri: String,
    /// Experiment that tracked runs are filed under
    pub experiment_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tracking_uri: DEFAULT_TRACKING_URI.to_string(),
            experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with explicit values.
    #[must_use]
    pub fn new(tracking_uri: impl Into<String>, experiment_name: impl Into<String>) -> Self {
        Self {
            tracking_uri: tracking_uri.into(),
            experiment_name: experiment_name.into(),
        }
    }

    /// Read the configuration from the process environment, falling back
    /// to the defaults for unset or empty variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            tracking_uri: pick(TRACKING_URI_ENV, DEFAULT_TRACKING_URI),
            experiment_name: pick(EXPERIMENT_NAME_ENV, DEFAULT_EXPERIMENT_NAME),
        }
    }

    /// Environment pairs that reproduce this configuration in a child process.
    #[must_use]
    pub fn env_pairs(&self) -> [(&'static str, &str); 2] {
        [
            (TRACKING_URI_ENV, self.tracking_uri.as_str()),
            (EXPERIMENT_NAME_ENV, self.experiment_name.as_str()),
        ]
    }
}

/// Fixed file locations used by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineLayout {
    /// Logical path of the raw dataset, resolved by the versioned repository
    pub raw_data: String,
    /// Output of the loader
    pub extracted: PathBuf,
    /// Training subset
    pub train: PathBuf,
    /// Held-out subset
    pub test: PathBuf,
    /// Serialized model
    pub model: PathBuf,
}

impl PipelineLayout {
    /// Standard layout under `root/data`.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        let data = root.join("data");
        Self {
            raw_data: "data/raw_data.csv".to_string(),
            extracted: data.join("extracted.csv"),
            train: data.join("train.csv"),
            test: data.join("test.csv"),
            model: data.join("model.bin"),
        }
    }
}

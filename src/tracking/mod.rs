//! Experiment Tracking
//!
//! Records of what each pipeline run did, plus the backends they are
//! written to.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< ParamRecord (N)
//!                              ├──< MetricRecord (N) [time-series]
//!                              └──< ArtifactRecord (N) [CAS]
//! ```
//!
//! ## Backends
//!
//! | URI | Backend |
//! |---|---|
//! | `http://...`, `https://...` | [`RestStore`] (MLflow REST API) |
//! | `file:<path>`, `file://<path>`, bare path | [`FileStore`] |
//! | (in-process) | [`MemoryStore`] |
//!
//! ## Usage
//!
//! ```rust
//! use trueno_pipeline::tracking::{MemoryStore, RunStatus, TrackingClient};
//!
//! let mut client = TrackingClient::with_backend(MemoryStore::new(), "demo")?;
//! let run_id = client.with_run("evaluate", |run| {
//!     run.log_metric("mse", 2900.0)?;
//!     Ok(run.run_id().to_string())
//! })?;
//!
//! let run = client.backend().run(&run_id).unwrap();
//! assert_eq!(run.status(), RunStatus::Finished);
//! # Ok::<(), trueno_pipeline::Error>(())
//! ```

mod client;
mod file_store;
mod memory;
mod records;
mod rest;

use std::path::PathBuf;

use crate::{Error, Result};

pub use client::{ActiveRun, TrackingClient};
pub use file_store::FileStore;
pub use memory::MemoryStore;
pub use records::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord, RunStatus,
};
pub use rest::RestStore;

/// Destination for tracking records.
pub trait TrackingBackend {
    /// Look up an experiment by name, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be read or written
    fn get_or_create_experiment(&mut self, name: &str) -> Result<ExperimentRecord>;

    /// Open a new run (status `Running`) under an existing experiment.
    ///
    /// # Errors
    ///
    /// Returns error if the experiment does not exist or the write fails
    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord>;

    /// Record a parameter.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    fn log_param(&mut self, param: &ParamRecord) -> Result<()>;

    /// Record a metric value.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    fn log_metric(&mut self, metric: &MetricRecord) -> Result<()>;

    /// Record an artifact's content hash.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    fn log_artifact(&mut self, artifact: &ArtifactRecord) -> Result<()>;

    /// Persist the run's current status and timestamps.
    ///
    /// # Errors
    ///
    /// Returns error if the run is unknown or the write fails
    fn update_run(&mut self, run: &RunRecord) -> Result<()>;
}

impl TrackingBackend for Box<dyn TrackingBackend> {
    fn get_or_create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        (**self).get_or_create_experiment(name)
    }

    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord> {
        (**self).create_run(experiment_id, run_name)
    }

    fn log_param(&mut self, param: &ParamRecord) -> Result<()> {
        (**self).log_param(param)
    }

    fn log_metric(&mut self, metric: &MetricRecord) -> Result<()> {
        (**self).log_metric(metric)
    }

    fn log_artifact(&mut self, artifact: &ArtifactRecord) -> Result<()> {
        (**self).log_artifact(artifact)
    }

    fn update_run(&mut self, run: &RunRecord) -> Result<()> {
        (**self).update_run(run)
    }
}

/// Parsed tracking URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingUri {
    /// Tracking server base URL.
    Http(String),
    /// Local directory.
    File(PathBuf),
}

impl TrackingUri {
    /// Classify a tracking URI by scheme.
    ///
    /// # Errors
    ///
    /// Returns `Error::Tracking` for an empty URI or an unsupported scheme
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(Error::Tracking("tracking URI is empty".to_string()));
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(Self::Http(uri.to_string()));
        }
        if let Some(rest) = uri.strip_prefix("file:") {
            let path = rest.strip_prefix("//").unwrap_or(rest);
            if path.is_empty() {
                return Err(Error::Tracking(format!("'{uri}' names no directory")));
            }
            return Ok(Self::File(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = uri.split_once("://") {
            return Err(Error::Tracking(format!(
                "unsupported tracking URI scheme '{scheme}'"
            )));
        }
        Ok(Self::File(PathBuf::from(uri)))
    }
}

/// Construct the backend a tracking URI names.
///
/// No network traffic happens here; an unreachable server surfaces on
/// the first tracking call.
///
/// # Errors
///
/// Returns `Error::Tracking` if the URI is unsupported
pub fn backend_for_uri(uri: &str) -> Result<Box<dyn TrackingBackend>> {
    match TrackingUri::parse(uri)? {
        TrackingUri::Http(base) => {
            tracing::debug!(%base, "using REST tracking backend");
            Ok(Box::new(RestStore::new(base)?))
        }
        TrackingUri::File(root) => {
            tracing::debug!(root = %root.display(), "using file tracking backend");
            Ok(Box::new(FileStore::new(root)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http() {
        assert_eq!(
            TrackingUri::parse("http://127.0.0.1:62686").unwrap(),
            TrackingUri::Http("http://127.0.0.1:62686".to_string())
        );
        assert!(matches!(
            TrackingUri::parse("https://mlflow.example.com").unwrap(),
            TrackingUri::Http(_)
        ));
    }

    #[test]
    fn test_parse_file_forms() {
        assert_eq!(
            TrackingUri::parse("file:///tmp/mlruns").unwrap(),
            TrackingUri::File(PathBuf::from("/tmp/mlruns"))
        );
        assert_eq!(
            TrackingUri::parse("file:mlruns").unwrap(),
            TrackingUri::File(PathBuf::from("mlruns"))
        );
        assert_eq!(
            TrackingUri::parse("./mlruns").unwrap(),
            TrackingUri::File(PathBuf::from("./mlruns"))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        let err = TrackingUri::parse("databricks://workspace").unwrap_err();
        assert!(err.to_string().contains("databricks"));
        assert!(TrackingUri::parse("   ").is_err());
        assert!(TrackingUri::parse("file://").is_err());
    }

    #[test]
    fn test_boxed_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = backend_for_uri(dir.path().to_str().unwrap()).unwrap();
        let exp = backend.get_or_create_experiment("boxed").unwrap();
        let mut run = backend.create_run(exp.experiment_id(), "r").unwrap();
        run.seal(RunStatus::Finished);
        backend.update_run(&run).unwrap();

        let store = FileStore::new(dir.path());
        assert_eq!(store.runs(exp.experiment_id()).unwrap()[0].status(), RunStatus::Finished);
    }
}

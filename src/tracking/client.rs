//! Tracking client - scoped run lifecycle on top of a backend

use super::{
    backend_for_uri, ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord,
    RunStatus, TrackingBackend,
};
use crate::config::PipelineConfig;
use crate::model::ArtifactDigest;
use crate::Result;

/// Handle to the experiment named in the pipeline configuration.
pub struct TrackingClient<B: TrackingBackend = Box<dyn TrackingBackend>> {
    backend: B,
    experiment: ExperimentRecord,
}

impl TrackingClient {
    /// Connect to the backend named by `config.tracking_uri` and resolve
    /// (or create) `config.experiment_name`.
    ///
    /// # Errors
    ///
    /// Returns error if the URI is unsupported or the backend is unreachable
    pub fn connect(config: &PipelineConfig) -> Result<Self> {
        let backend = backend_for_uri(&config.tracking_uri)?;
        Self::with_backend(backend, &config.experiment_name)
    }
}

impl<B: TrackingBackend> TrackingClient<B> {
    /// Use an explicit backend.
    ///
    /// # Errors
    ///
    /// Returns error if the experiment cannot be resolved or created
    pub fn with_backend(mut backend: B, experiment_name: &str) -> Result<Self> {
        let experiment = backend.get_or_create_experiment(experiment_name)?;
        Ok(Self {
            backend,
            experiment,
        })
    }

    /// Experiment runs are filed under.
    #[must_use]
    pub const fn experiment(&self) -> &ExperimentRecord {
        &self.experiment
    }

    /// Borrow the backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Run `body` inside a new tracked run.
    ///
    /// The run is sealed `Finished` when `body` returns `Ok` and `Failed`
    /// otherwise; the body's error takes precedence over a failure to
    /// seal the run.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or a backend error from opening or
    /// sealing the run.
    pub fn with_run<T, F>(&mut self, run_name: &str, body: F) -> Result<T>
    where
        F: FnOnce(&mut ActiveRun<'_>) -> Result<T>,
    {
        let run = self
            .backend
            .create_run(self.experiment.experiment_id(), run_name)?;
        tracing::info!(run_id = run.run_id(), run_name, "opened tracked run");

        let mut active = ActiveRun {
            backend: &mut self.backend,
            run,
        };
        let outcome = body(&mut active);

        let status = if outcome.is_ok() {
            RunStatus::Finished
        } else {
            RunStatus::Failed
        };
        let ActiveRun { backend, mut run } = active;
        run.seal(status);
        let sealed = backend.update_run(&run);
        tracing::info!(run_id = run.run_id(), ?status, "sealed tracked run");

        let value = outcome?;
        sealed?;
        Ok(value)
    }
}

/// A run that is open for logging.
pub struct ActiveRun<'a> {
    backend: &'a mut dyn TrackingBackend,
    run: RunRecord,
}

impl ActiveRun<'_> {
    /// ID of the open run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.run.run_id()
    }

    /// Snapshot of the run record.
    #[must_use]
    pub const fn record(&self) -> &RunRecord {
        &self.run
    }

    /// Log one parameter.
    ///
    /// # Errors
    ///
    /// Returns backend errors
    pub fn log_param(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let param = ParamRecord::new(self.run.run_id(), key, value);
        self.backend.log_param(&param)
    }

    /// Log several parameters.
    ///
    /// # Errors
    ///
    /// Returns the first backend error
    pub fn log_params<I, K, V>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in params {
            self.log_param(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Log a metric at step 0.
    ///
    /// # Errors
    ///
    /// Returns backend errors
    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        self.log_metric_at(key, value, 0)
    }

    /// Log a metric at an explicit step.
    ///
    /// # Errors
    ///
    /// Returns backend errors
    pub fn log_metric_at(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        let metric = MetricRecord::new(self.run.run_id(), key, step, value);
        self.backend.log_metric(&metric)
    }

    /// Record the content hash of a file the run produced.
    ///
    /// # Errors
    ///
    /// Returns backend errors
    pub fn log_artifact(&mut self, key: &str, digest: &ArtifactDigest) -> Result<()> {
        let artifact = ArtifactRecord::from_digest(self.run.run_id(), key, digest);
        self.backend.log_artifact(&artifact)
    }
}

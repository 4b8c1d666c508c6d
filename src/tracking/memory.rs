//! In-process tracking backend
//!
//! Keeps every record in memory so a caller can inspect what a stage
//! logged without a server or a directory.

use super::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord, TrackingBackend,
};
use crate::{Error, Result};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct RunLog {
    record: Option<RunRecord>,
    params: Vec<ParamRecord>,
    metrics: Vec<MetricRecord>,
    artifacts: Vec<ArtifactRecord>,
}

/// Tracking backend holding records in memory.
///
/// Experiment IDs count up from `1` and run IDs from `run-0001`, so two
/// stores fed the same calls hold the same IDs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    experiments: Vec<ExperimentRecord>,
    runs: BTreeMap<String, RunLog>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of experiments
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of runs across all experiments
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Experiment by name.
    #[must_use]
    pub fn experiment(&self, name: &str) -> Option<&ExperimentRecord> {
        self.experiments.iter().find(|e| e.name() == name)
    }

    /// Run by ID.
    #[must_use]
    pub fn run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.get(run_id).and_then(|log| log.record.as_ref())
    }

    /// Runs of an experiment, in creation order.
    #[must_use]
    pub fn runs(&self, experiment_id: &str) -> Vec<&RunRecord> {
        self.runs
            .values()
            .filter_map(|log| log.record.as_ref())
            .filter(|run| run.experiment_id() == experiment_id)
            .collect()
    }

    /// Parameters of a run, in logging order.
    #[must_use]
    pub fn params(&self, run_id: &str) -> &[ParamRecord] {
        self.runs.get(run_id).map_or(&[][..], |log| log.params.as_slice())
    }

    /// Value of one parameter.
    #[must_use]
    pub fn param(&self, run_id: &str, key: &str) -> Option<&str> {
        self.params(run_id)
            .iter()
            .find(|p| p.key() == key)
            .map(ParamRecord::value)
    }

    /// Series of one metric, ordered by step. Points logged at the same
    /// step keep their logging order.
    #[must_use]
    pub fn metric_series(&self, run_id: &str, key: &str) -> Vec<&MetricRecord> {
        let mut series: Vec<&MetricRecord> = self
            .runs
            .get(run_id)
            .map(|log| log.metrics.iter().filter(|m| m.key() == key).collect())
            .unwrap_or_default();
        series.sort_by_key(|m| m.step());
        series
    }

    /// Last value of a metric series.
    #[must_use]
    pub fn latest_metric(&self, run_id: &str, key: &str) -> Option<f64> {
        self.metric_series(run_id, key)
            .last()
            .map(|m| m.value())
    }

    /// Artifacts of a run.
    #[must_use]
    pub fn artifacts(&self, run_id: &str) -> &[ArtifactRecord] {
        self.runs.get(run_id).map_or(&[][..], |log| log.artifacts.as_slice())
    }

    fn log_for(&mut self, run_id: &str) -> Result<&mut RunLog> {
        match self.runs.get_mut(run_id) {
            Some(log) if log.record.is_some() => Ok(log),
            _ => Err(Error::Tracking(format!("run '{run_id}' does not exist"))),
        }
    }
}

impl TrackingBackend for MemoryStore {
    fn get_or_create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        if let Some(existing) = self.experiment(name) {
            return Ok(existing.clone());
        }
        let experiment = ExperimentRecord::new((self.experiments.len() + 1).to_string(), name);
        self.experiments.push(experiment.clone());
        Ok(experiment)
    }

    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord> {
        if !self
            .experiments
            .iter()
            .any(|e| e.experiment_id() == experiment_id)
        {
            return Err(Error::Tracking(format!(
                "experiment '{experiment_id}' does not exist"
            )));
        }
        let run = RunRecord::open(
            format!("run-{:04}", self.runs.len() + 1),
            experiment_id,
            run_name,
        );
        self.runs.insert(
            run.run_id().to_string(),
            RunLog {
                record: Some(run.clone()),
                ..RunLog::default()
            },
        );
        Ok(run)
    }

    fn log_param(&mut self, param: &ParamRecord) -> Result<()> {
        self.log_for(param.run_id())?.params.push(param.clone());
        Ok(())
    }

    fn log_metric(&mut self, metric: &MetricRecord) -> Result<()> {
        self.log_for(metric.run_id())?.metrics.push(metric.clone());
        Ok(())
    }

    fn log_artifact(&mut self, artifact: &ArtifactRecord) -> Result<()> {
        self.log_for(artifact.run_id())?
            .artifacts
            .push(artifact.clone());
        Ok(())
    }

    fn update_run(&mut self, run: &RunRecord) -> Result<()> {
        self.log_for(run.run_id())?.record = Some(run.clone());
        Ok(())
    }
}

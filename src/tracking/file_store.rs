//! File Store - tracking records persisted under a local directory
//!
//! ```text
//! <root>/<experiment_id>/meta.json              ExperimentRecord
//! <root>/<experiment_id>/<run_id>/run.json      RunRecord (rewritten on update)
//! <root>/<experiment_id>/<run_id>/metrics.jsonl MetricRecord per line
//! <root>/<experiment_id>/<run_id>/params.jsonl  ParamRecord per line
//! <root>/<experiment_id>/<run_id>/artifacts.jsonl
//! ```

use super::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord, TrackingBackend,
};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const META_FILE: &str = "meta.json";
const RUN_FILE: &str = "run.json";
const METRICS_FILE: &str = "metrics.jsonl";
const PARAMS_FILE: &str = "params.jsonl";
const ARTIFACTS_FILE: &str = "artifacts.jsonl";

/// Tracking backend writing JSON records to a directory tree.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Store rooted at `root`; the directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All experiments found under the root.
    ///
    /// # Errors
    ///
    /// Returns error if a metadata file cannot be read
    pub fn experiments(&self) -> Result<Vec<ExperimentRecord>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut experiments = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let meta = entry?.path().join(META_FILE);
            if meta.is_file() {
                experiments.push(read_json(&meta)?);
            }
        }
        experiments.sort_by(|a: &ExperimentRecord, b| a.experiment_id().cmp(b.experiment_id()));
        Ok(experiments)
    }

    /// Experiment with the given name, if present.
    ///
    /// # Errors
    ///
    /// Returns error if a metadata file cannot be read
    pub fn find_experiment(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self.experiments()?.into_iter().find(|e| e.name() == name))
    }

    /// Runs of an experiment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if a run file cannot be read
    pub fn runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        let dir = self.root.join(experiment_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut runs: Vec<RunRecord> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let run_file = entry?.path().join(RUN_FILE);
            if run_file.is_file() {
                runs.push(read_json(&run_file)?);
            }
        }
        runs.sort_by_key(RunRecord::started_at);
        Ok(runs)
    }

    /// Metrics logged for a run, in logging order.
    ///
    /// # Errors
    ///
    /// Returns error if the metrics file is malformed
    pub fn metrics(&self, run: &RunRecord) -> Result<Vec<MetricRecord>> {
        read_lines(&self.run_dir(run.experiment_id(), run.run_id()).join(METRICS_FILE))
    }

    /// Parameters logged for a run, in logging order.
    ///
    /// # Errors
    ///
    /// Returns error if the params file is malformed
    pub fn params(&self, run: &RunRecord) -> Result<Vec<ParamRecord>> {
        read_lines(&self.run_dir(run.experiment_id(), run.run_id()).join(PARAMS_FILE))
    }

    /// Artifacts recorded for a run.
    ///
    /// # Errors
    ///
    /// Returns error if the artifacts file is malformed
    pub fn artifacts(&self, run: &RunRecord) -> Result<Vec<ArtifactRecord>> {
        read_lines(&self.run_dir(run.experiment_id(), run.run_id()).join(ARTIFACTS_FILE))
    }

    fn run_dir(&self, experiment_id: &str, run_id: &str) -> PathBuf {
        self.root.join(experiment_id).join(run_id)
    }

    // Runs are addressed by ID only, so find the experiment directory holding it.
    fn locate_run(&self, run_id: &str) -> Result<PathBuf> {
        for experiment in self.experiments()? {
            let dir = self.run_dir(experiment.experiment_id(), run_id);
            if dir.join(RUN_FILE).is_file() {
                return Ok(dir);
            }
        }
        Err(Error::Tracking(format!("run '{run_id}' does not exist")))
    }

    fn next_experiment_id(&self) -> Result<String> {
        let max = self
            .experiments()?
            .iter()
            .filter_map(|e| e.experiment_id().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Ok((max + 1).to_string())
    }
}

impl TrackingBackend for FileStore {
    fn get_or_create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        if let Some(existing) = self.find_experiment(name)? {
            return Ok(existing);
        }
        let experiment = ExperimentRecord::new(self.next_experiment_id()?, name);
        let dir = self.root.join(experiment.experiment_id());
        fs::create_dir_all(&dir)?;
        write_json(&dir.join(META_FILE), &experiment)?;
        tracing::info!(
            experiment = name,
            id = experiment.experiment_id(),
            root = %self.root.display(),
            "created experiment"
        );
        Ok(experiment)
    }

    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord> {
        if !self.root.join(experiment_id).join(META_FILE).is_file() {
            return Err(Error::Tracking(format!(
                "experiment '{experiment_id}' does not exist"
            )));
        }
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let run = RunRecord::open(run_id, experiment_id, run_name);

        let dir = self.run_dir(experiment_id, run.run_id());
        fs::create_dir_all(&dir)?;
        write_json(&dir.join(RUN_FILE), &run)?;
        Ok(run)
    }

    fn log_param(&mut self, param: &ParamRecord) -> Result<()> {
        let dir = self.locate_run(param.run_id())?;
        append_line(&dir.join(PARAMS_FILE), param)
    }

    fn log_metric(&mut self, metric: &MetricRecord) -> Result<()> {
        let dir = self.locate_run(metric.run_id())?;
        append_line(&dir.join(METRICS_FILE), metric)
    }

    fn log_artifact(&mut self, artifact: &ArtifactRecord) -> Result<()> {
        let dir = self.locate_run(artifact.run_id())?;
        append_line(&dir.join(ARTIFACTS_FILE), artifact)
    }

    fn update_run(&mut self, run: &RunRecord) -> Result<()> {
        let dir = self.locate_run(run.run_id())?;
        write_json(&dir.join(RUN_FILE), run)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Tracking(format!("malformed record {}: {e}", path.display())))
}

fn append_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&line)?;
    Ok(())
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| {
                Error::Tracking(format!("malformed record in {}: {e}", path.display()))
            })
        })
        .collect()
}

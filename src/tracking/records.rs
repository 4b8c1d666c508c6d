//! Tracking records
//!
//! Plain data handed to a [`super::TrackingBackend`]. Timestamps are UTC;
//! the REST backend converts them to epoch milliseconds on the wire.

use crate::model::ArtifactDigest;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a run, named as tracking servers name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Open for logging
    Running,
    /// Sealed after the tracked body returned successfully
    Finished,
    /// Sealed after the tracked body returned an error
    Failed,
    /// Abandoned without being sealed by its owner
    Killed,
}

impl RunStatus {
    /// Wire name (`RUNNING`, `FINISHED`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        }
    }

    /// Whether the run no longer accepts records.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named group of runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    experiment_id: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl ExperimentRecord {
    /// Experiment created now.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::restore(experiment_id, name, Utc::now())
    }

    /// Experiment as reported by a backend that already holds it.
    #[must_use]
    pub fn restore(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            created_at,
        }
    }

    /// Backend-assigned ID
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Experiment name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation time
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// One tracked stage invocation.
///
/// Runs are born `Running` and sealed exactly once with [`RunRecord::seal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    run_name: String,
    status: RunStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Run opened now.
    #[must_use]
    pub fn open(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
        run_name: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            run_name: run_name.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Replace the start time with the one a server assigned.
    #[must_use]
    pub const fn started(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Run ID
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Parent experiment ID
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Stage name the run was opened for
    #[must_use]
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Start time
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// End time, once sealed
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Wall time between start and seal.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }

    /// Seal the run with a terminal status and stamp its end time.
    /// Sealing an already sealed run keeps the first seal.
    pub fn seal(&mut self, status: RunStatus) {
        if self.status.is_terminal() || !status.is_terminal() {
            return;
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

/// One estimator setting, stored as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRecord {
    run_id: String,
    key: String,
    value: String,
}

impl ParamRecord {
    /// New parameter record.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Owning run
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Parameter name
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Parameter value
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// One point of a metric series. Stage metrics are logged at step 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    run_id: String,
    key: String,
    step: u64,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Metric point stamped now.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, step: u64, value: f64) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            step,
            value,
            timestamp: Utc::now(),
        }
    }

    /// Override the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Owning run
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Metric name
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Position in the series
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Value
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// When the point was logged
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp in epoch milliseconds.
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Content hash of a file a run wrote. The bytes stay where the stage put
/// them; `cas_hash` (`algorithm:hex`) pins that exact content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    run_id: String,
    key: String,
    cas_hash: String,
    size_bytes: u64,
}

impl ArtifactRecord {
    /// New artifact record.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        key: impl Into<String>,
        cas_hash: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            cas_hash: cas_hash.into(),
            size_bytes,
        }
    }

    /// Record for a saved model.
    #[must_use]
    pub fn from_digest(run_id: impl Into<String>, key: impl Into<String>, digest: &ArtifactDigest) -> Self {
        Self::new(run_id, key, digest.cas_hash.clone(), digest.size_bytes)
    }

    /// Owning run
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Artifact name
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `algorithm:hex` digest
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Hash algorithm prefix, if the hash carries one.
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.cas_hash.split_once(':').map(|(algorithm, _)| algorithm)
    }

    /// Size in bytes
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

impl fmt::Display for ArtifactRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.cas_hash, self.size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_seals_once() {
        let mut run = RunRecord::open("r1", "1", "train");
        assert_eq!(run.status(), RunStatus::Running);
        assert!(run.duration().is_none());

        run.seal(RunStatus::Failed);
        let ended = run.ended_at();
        run.seal(RunStatus::Finished);
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.ended_at(), ended);
        assert!(run.duration().unwrap() >= Duration::zero());
    }

    #[test]
    fn test_sealing_with_running_is_ignored() {
        let mut run = RunRecord::open("r1", "1", "train");
        run.seal(RunStatus::Running);
        assert!(run.ended_at().is_none());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(RunStatus::Finished.to_string(), "FINISHED");
        assert_eq!(serde_json::to_string(&RunStatus::Killed).unwrap(), "\"KILLED\"");
        let parsed: RunStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(parsed, RunStatus::Failed);
    }

    #[test]
    fn test_artifact_from_digest() {
        let digest = ArtifactDigest {
            cas_hash: "sha256:ab".to_string(),
            size_bytes: 12,
        };
        let artifact = ArtifactRecord::from_digest("r1", "model", &digest);
        assert_eq!(artifact.algorithm(), Some("sha256"));
        assert_eq!(artifact.to_string(), "sha256:ab (12 bytes)");
    }

    #[test]
    fn test_metric_timestamp_override() {
        let when = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let metric = MetricRecord::new("r1", "mse", 0, 1.5).at(when);
        assert_eq!(metric.timestamp_millis(), 1_700_000_000_000);
    }
}

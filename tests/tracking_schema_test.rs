//! Experiment tracking schema and backend tests

use trueno_pipeline::config::PipelineConfig;
use trueno_pipeline::tracking::{
    backend_for_uri, ArtifactRecord, ExperimentRecord, FileStore, MemoryStore, MetricRecord,
    ParamRecord, RunRecord, RunStatus, TrackingBackend, TrackingClient, TrackingUri,
};

// =============================================================================
// ExperimentRecord Tests
// =============================================================================

#[test]
fn test_experiment_record_creation() {
    let record = ExperimentRecord::new("1", "diabetes_pipeline");

    assert_eq!(record.experiment_id(), "1");
    assert_eq!(record.name(), "diabetes_pipeline");
    assert!(record.created_at().timestamp() > 0);
}

#[test]
fn test_experiment_record_serialization() {
    let record = ExperimentRecord::new("3", "Serialization Test");

    let json = serde_json::to_string(&record).expect("serialization failed");
    let deserialized: ExperimentRecord =
        serde_json::from_str(&json).expect("deserialization failed");

    assert_eq!(record, deserialized);
}

// =============================================================================
// RunRecord Tests
// =============================================================================

#[test]
fn test_run_record_opens_running() {
    let run = RunRecord::open("run-001", "1", "train");

    assert_eq!(run.run_id(), "run-001");
    assert_eq!(run.experiment_id(), "1");
    assert_eq!(run.run_name(), "train");
    assert_eq!(run.status(), RunStatus::Running);
    assert!(run.ended_at().is_none());
}

#[test]
fn test_run_record_seal_stamps_end() {
    let mut run = RunRecord::open("run-003", "1", "evaluate");
    run.seal(RunStatus::Finished);

    assert_eq!(run.status(), RunStatus::Finished);
    assert!(run.ended_at().unwrap() >= run.started_at());
}

#[test]
fn test_run_record_serialization() {
    let run = RunRecord::open("run-006", "1", "train");

    let json = serde_json::to_string(&run).expect("serialization failed");
    assert!(json.contains("\"RUNNING\""));
    let deserialized: RunRecord = serde_json::from_str(&json).expect("deserialization failed");

    assert_eq!(run, deserialized);
}

// =============================================================================
// Metric / Param / Artifact Records
// =============================================================================

#[test]
fn test_metric_record_with_explicit_timestamp() {
    use chrono::{TimeZone, Utc};
    let ts = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();

    let metric = MetricRecord::new("run-001", "mse", 0, 2900.0).at(ts);

    assert_eq!(metric.timestamp(), ts);
    assert_eq!(metric.timestamp_millis(), ts.timestamp_millis());
}

#[test]
fn test_param_record_serialization() {
    let param = ParamRecord::new("run-001", "n_estimators", "100");
    let json = serde_json::to_string(&param).expect("serialization failed");
    let deserialized: ParamRecord = serde_json::from_str(&json).expect("deserialization failed");
    assert_eq!(param, deserialized);
}

#[test]
fn test_artifact_record_cas_hash_format() {
    let artifact = ArtifactRecord::new("run-001", "model", "sha256:e3b0c44298fc1c14", 0);
    assert_eq!(artifact.algorithm(), Some("sha256"));
}

// =============================================================================
// Backends
// =============================================================================

#[test]
fn test_uri_dispatch() {
    assert!(matches!(
        TrackingUri::parse("http://127.0.0.1:62686").unwrap(),
        TrackingUri::Http(_)
    ));
    assert!(matches!(
        TrackingUri::parse("file:///tmp/mlruns").unwrap(),
        TrackingUri::File(_)
    ));
    assert!(backend_for_uri("s3://bucket/runs").is_err());
}

#[test]
fn test_client_over_file_store_persists_runs() {
    let dir = tempfile::tempdir().unwrap();
    let uri = format!("file://{}", dir.path().display());
    let config = PipelineConfig::new(uri, "diabetes_pipeline");

    let mut client = TrackingClient::connect(&config).unwrap();
    let experiment_id = client.experiment().experiment_id().to_string();
    client
        .with_run("evaluate", |run| {
            run.log_metric("mse", 3000.0)?;
            run.log_metric("r2_score", 0.45)
        })
        .unwrap();

    let store = FileStore::new(dir.path());
    let experiment = store.find_experiment("diabetes_pipeline").unwrap().unwrap();
    assert_eq!(experiment.experiment_id(), experiment_id);

    let runs = store.runs(&experiment_id).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status(), RunStatus::Finished);
    assert_eq!(runs[0].run_name(), "evaluate");

    let keys: Vec<String> = store
        .metrics(&runs[0])
        .unwrap()
        .iter()
        .map(|m| m.key().to_string())
        .collect();
    assert_eq!(keys, ["mse", "r2_score"]);
}

#[test]
fn test_second_connect_reuses_experiment() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new(dir.path().to_string_lossy(), "exp");

    let first = TrackingClient::connect(&config).unwrap();
    let second = TrackingClient::connect(&config).unwrap();
    assert_eq!(
        first.experiment().experiment_id(),
        second.experiment().experiment_id()
    );
}

#[test]
fn test_in_memory_store_backend_contract() {
    let mut store = MemoryStore::new();
    let experiment = store.get_or_create_experiment("exp").unwrap();
    let mut run = store.create_run(experiment.experiment_id(), "train").unwrap();

    store
        .log_param(&ParamRecord::new(run.run_id(), "bootstrap", "true"))
        .unwrap();
    store
        .log_metric(&MetricRecord::new(run.run_id(), "training_score", 0, 0.9))
        .unwrap();
    run.seal(RunStatus::Failed);
    store.update_run(&run).unwrap();

    assert_eq!(store.run(run.run_id()).unwrap().status(), RunStatus::Failed);
    assert_eq!(store.latest_metric(run.run_id(), "training_score"), Some(0.9));
}

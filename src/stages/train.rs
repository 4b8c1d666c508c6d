//! Training stage
//!
//! Fits the forest inside a tracked run and records what an autologging
//! tracker would: every estimator parameter, the fit-time metrics on the
//! training data, and the content hash of the saved model.

use crate::config::{PipelineConfig, TARGET_COLUMN};
use crate::dataset::{Dataset, DatasetSchema};
use crate::metrics::{mean_absolute_error, mean_squared_error, r2_score, root_mean_squared_error};
use crate::model::{ArtifactDigest, ForestParams, ModelArtifact, RandomForestRegressor, Regressor};
use crate::tracking::{TrackingBackend, TrackingClient};
use crate::Result;
use std::path::Path;
use std::time::Instant;

/// Name of the tracked run opened by this stage
pub const RUN_NAME: &str = "train";

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Tracked run ID
    pub run_id: String,
    /// Training rows
    pub n_samples: usize,
    /// Feature columns
    pub n_features: usize,
    /// R² on the training data
    pub training_score: f64,
    /// Written model
    pub artifact: ArtifactDigest,
}

/// Train on `train_path`, save to `model_path`, tracking to the backend
/// named by `config`.
///
/// # Errors
///
/// Returns tracking, schema, model or write errors
pub fn run(
    train_path: &Path,
    model_path: &Path,
    config: &PipelineConfig,
) -> Result<TrainingReport> {
    let mut client = TrackingClient::connect(config)?;
    run_with(&mut client, train_path, model_path, ForestParams::default())
}

/// Train with an explicit tracking client and forest parameters.
///
/// # Errors
///
/// See [`run`].
pub fn run_with<B: TrackingBackend>(
    client: &mut TrackingClient<B>,
    train_path: &Path,
    model_path: &Path,
    params: ForestParams,
) -> Result<TrainingReport> {
    let dataset = Dataset::read_csv(train_path)?;
    let schema = DatasetSchema::infer(&dataset, TARGET_COLUMN)?;
    let (x, y) = dataset.features_and_target(&schema)?;

    client.with_run(RUN_NAME, |run| {
        run.log_params(params.as_pairs())?;

        let started = Instant::now();
        let model = RandomForestRegressor::fit(params, &x, &y)?;
        let fit_seconds = started.elapsed().as_secs_f64();

        let fitted = model.predict(&x)?;
        let mse = mean_squared_error(&y, &fitted)?;
        let r2 = r2_score(&y, &fitted)?;
        run.log_metric("training_mean_squared_error", mse)?;
        run.log_metric(
            "training_root_mean_squared_error",
            root_mean_squared_error(&y, &fitted)?,
        )?;
        run.log_metric("training_mean_absolute_error", mean_absolute_error(&y, &fitted)?)?;
        run.log_metric("training_r2_score", r2)?;
        run.log_metric("training_score", r2)?;
        run.log_metric("fit_duration_seconds", fit_seconds)?;

        let artifact = ModelArtifact::new(schema.clone(), model).save(model_path)?;
        run.log_artifact("model", &artifact)?;

        tracing::info!(
            rows = x.n_rows(),
            features = x.n_cols(),
            fit_seconds,
            model = %model_path.display(),
            "trained forest"
        );
        Ok(TrainingReport {
            run_id: run.run_id().to_string(),
            n_samples: x.n_rows(),
            n_features: x.n_cols(),
            training_score: r2,
            artifact,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TreeParams;
    use crate::tracking::{MemoryStore, RunStatus};
    use crate::Error;

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 8,
            random_state: 42,
            bootstrap: true,
            tree: TreeParams::default(),
        }
    }

    fn write_train(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("train.csv");
        std::fs::write(
            &path,
            "a,b,target\n1,0,3\n2,1,5\n3,0,7\n4,1,9\n5,0,11\n6,1,13\n7,0,15\n8,1,17\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_autologs_params_metrics_and_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_train(dir.path());
        let model = dir.path().join("model.bin");
        let mut client = TrackingClient::with_backend(MemoryStore::new(), "t").unwrap();

        let report = run_with(&mut client, &train, &model, small_params()).unwrap();
        assert!(model.is_file());
        assert_eq!(report.n_samples, 8);
        assert_eq!(report.n_features, 2);

        let store = client.backend();
        let run = store.run(&report.run_id).unwrap();
        assert_eq!(run.status(), RunStatus::Finished);
        assert_eq!(run.run_name(), RUN_NAME);

        assert_eq!(store.param(&report.run_id, "n_estimators"), Some("8"));
        assert_eq!(store.param(&report.run_id, "random_state"), Some("42"));
        for key in [
            "training_mean_squared_error",
            "training_r2_score",
            "training_score",
            "fit_duration_seconds",
        ] {
            assert!(store.latest_metric(&report.run_id, key).is_some(), "{key}");
        }

        let artifacts = store.artifacts(&report.run_id);
        assert_eq!(artifacts[0].cas_hash(), report.artifact.cas_hash);
        let loaded = ModelArtifact::load(&model).unwrap();
        assert_eq!(loaded.schema().features(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_missing_target_fails_before_opening_run() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train.csv");
        std::fs::write(&train, "a,b\n1,2\n").unwrap();
        let mut client = TrackingClient::with_backend(MemoryStore::new(), "t").unwrap();

        let err = run_with(&mut client, &train, &dir.path().join("m.bin"), small_params())
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
        assert_eq!(client.backend().run_count(), 0);
    }

    #[test]
    fn test_unwritable_model_seals_run_failed() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_train(dir.path());
        let model = dir.path().join("no_such_dir").join("model.bin");
        let mut client = TrackingClient::with_backend(MemoryStore::new(), "t").unwrap();

        assert!(run_with(&mut client, &train, &model, small_params()).is_err());
        let runs = client.backend().runs(client.experiment().experiment_id());
        assert_eq!(runs[0].status(), RunStatus::Failed);
    }
}

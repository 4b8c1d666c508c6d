//! Evaluation stage - MSE and R² on the held-out subset

use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::metrics::RegressionReport;
use crate::model::ModelArtifact;
use crate::tracking::{TrackingBackend, TrackingClient};
use crate::Result;
use std::fmt;
use std::path::Path;

/// Name of the tracked run opened by this stage
pub const RUN_NAME: &str = "evaluate";

/// Metrics of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    /// Tracked run ID
    pub run_id: String,
    /// Rows evaluated
    pub n_samples: usize,
    /// Metric values
    pub metrics: RegressionReport,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "✅ Evaluation Results - MSE: {:.4}, R2: {:.4}",
            self.metrics.mse, self.metrics.r2
        )
    }
}

/// Evaluate the model at `model_path` on `test_path`, tracking to the
/// backend named by `config`.
///
/// # Errors
///
/// Returns model decoding, schema, metric or tracking errors
pub fn run(
    model_path: &Path,
    test_path: &Path,
    config: &PipelineConfig,
) -> Result<EvaluationReport> {
    let mut client = TrackingClient::connect(config)?;
    run_with(&mut client, model_path, test_path)
}

/// Evaluate with an explicit tracking client.
///
/// # Errors
///
/// See [`run`].
pub fn run_with<B: TrackingBackend>(
    client: &mut TrackingClient<B>,
    model_path: &Path,
    test_path: &Path,
) -> Result<EvaluationReport> {
    let artifact = ModelArtifact::load(model_path)?;
    let dataset = Dataset::read_csv(test_path)?;
    artifact.schema().check(&dataset)?;
    let (y_true, y_pred) = artifact.predict_dataset(&dataset)?;
    let metrics = RegressionReport::compute(&y_true, &y_pred)?;

    client.with_run(RUN_NAME, |run| {
        run.log_metric("mse", metrics.mse)?;
        run.log_metric("r2_score", metrics.r2)?;
        tracing::info!(mse = metrics.mse, r2 = metrics.r2, "evaluated model");
        Ok(EvaluationReport {
            run_id: run.run_id().to_string(),
            n_samples: y_true.len(),
            metrics,
        })
    })
}

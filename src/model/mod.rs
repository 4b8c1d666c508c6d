//! Regression models and the serialized model artifact
//!
//! ```text
//! RandomForestRegressor ──< DecisionTreeRegressor (N, bagged)
//! ModelArtifact = { format_version, schema, forest }  →  opaque JSON blob
//! ```

mod artifact;
mod forest;
mod tree;

pub use artifact::{ArtifactDigest, ModelArtifact, ARTIFACT_FORMAT_VERSION};
pub use forest::{ForestParams, RandomForestRegressor};
pub use tree::{DecisionTreeRegressor, Node, TreeParams};

use crate::dataset::FeatureMatrix;
use crate::Result;

/// A fitted model that maps feature rows to scalar predictions.
pub trait Regressor {
    /// Predict one value per row of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Model`] if `x` has the wrong number of columns.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>>;
}

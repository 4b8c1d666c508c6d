//! Model artifact - the fitted forest plus the schema it was trained on

use super::{RandomForestRegressor, Regressor};
use crate::dataset::{Dataset, DatasetSchema};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Current on-disk format version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Serialized output of the training stage.
///
/// Produced once by training, read once by evaluation. The bytes are
/// opaque to every other component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    format_version: u32,
    schema: DatasetSchema,
    trained_at: DateTime<Utc>,
    model: RandomForestRegressor,
}

/// Content hash and size of a written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDigest {
    /// `sha256:<hex>`
    pub cas_hash: String,
    /// Size of the blob in bytes
    pub size_bytes: u64,
}

impl ModelArtifact {
    /// Wrap a fitted model with the schema of its training data.
    #[must_use]
    pub fn new(schema: DatasetSchema, model: RandomForestRegressor) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            schema,
            trained_at: Utc::now(),
            model,
        }
    }

    /// Training schema.
    #[must_use]
    pub const fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    /// Fitted model.
    #[must_use]
    pub const fn model(&self) -> &RandomForestRegressor {
        &self.model
    }

    /// Training timestamp.
    #[must_use]
    pub const fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Encode to the artifact byte format.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from the artifact byte format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] if the bytes are not an artifact, were
    /// written by an incompatible format version, or hold a forest whose
    /// structure does not match its schema.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = serde_json::from_slice(bytes)
            .map_err(|e| Error::Model(format!("not a model artifact: {e}")))?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::Model(format!(
                "unsupported artifact format version {} (expected {ARTIFACT_FORMAT_VERSION})",
                artifact.format_version
            )));
        }
        artifact.model.validate(artifact.schema.features().len())?;
        Ok(artifact)
    }

    /// Write to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<ArtifactDigest> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), &bytes)?;
        Ok(ArtifactDigest {
            cas_hash: format!("sha256:{}", hex::encode(Sha256::digest(&bytes))),
            size_bytes: bytes.len() as u64,
        })
    }

    /// Read from `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or decoded
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Predict the target for every row of `dataset`, after checking that
    /// it carries the training features.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the feature set differs from
    /// training.
    pub fn predict_dataset(&self, dataset: &Dataset) -> Result<(Vec<f64>, Vec<f64>)> {
        let (x, y) = dataset.features_and_target(&self.schema)?;
        let predictions = self.model.predict(&x)?;
        Ok((y, predictions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ForestParams;

    fn fitted() -> (Dataset, ModelArtifact) {
        let dataset =
            Dataset::from_csv_bytes(b"a,b,target\n1,5,2\n2,4,4\n3,3,6\n4,2,8\n5,1,10\n").unwrap();
        let schema = DatasetSchema::infer(&dataset, "target").unwrap();
        let (x, y) = dataset.features_and_target(&schema).unwrap();
        let params = ForestParams {
            n_estimators: 5,
            ..ForestParams::default()
        };
        let forest = RandomForestRegressor::fit(params, &x, &y).unwrap();
        (dataset, ModelArtifact::new(schema, forest))
    }

    #[test]
    fn test_save_load_preserves_model() {
        let (_, artifact) = fitted();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");

        let digest = artifact.save(&path).unwrap();
        assert!(digest.cas_hash.starts_with("sha256:"));
        assert_eq!(digest.size_bytes, std::fs::metadata(&path).unwrap().len());

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn test_garbage_rejected() {
        let err = ModelArtifact::from_bytes(b"\x00\x01not json").unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }

    #[test]
    fn test_future_version_rejected() {
        let (_, artifact) = fitted();
        let mut value = serde_json::to_value(&artifact).unwrap();
        value["format_version"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&value).unwrap();
        let err = ModelArtifact::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("format version 99"));
    }

    #[test]
    fn test_tampered_trees_rejected() {
        let (_, artifact) = fitted();
        let pristine = serde_json::to_value(&artifact).unwrap();
        let split = |feature: usize, left: usize, right: usize| {
            serde_json::json!({
                "Split": {"feature": feature, "threshold": 0.5, "left": left, "right": right}
            })
        };
        let leaf = serde_json::json!({"Leaf": {"value": 1.0}});
        let tampered_nodes = [
            serde_json::json!([split(0, 0, 0)]),
            serde_json::json!([split(0, 1, 7), leaf.clone()]),
            serde_json::json!([split(2, 1, 2), leaf.clone(), leaf]),
            serde_json::json!([]),
        ];

        for nodes in tampered_nodes {
            let mut value = pristine.clone();
            value["model"]["trees"][0]["nodes"] = nodes;
            let bytes = serde_json::to_vec(&value).unwrap();
            let err = ModelArtifact::from_bytes(&bytes).unwrap_err();
            assert!(matches!(err, Error::Model(_)), "{err}");
            assert!(err.to_string().contains("tree 0"), "{err}");
        }
    }

    #[test]
    fn test_feature_count_must_match_schema() {
        let (_, artifact) = fitted();
        let mut value = serde_json::to_value(&artifact).unwrap();
        value["schema"]["features"] = serde_json::json!(["a"]);
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(matches!(ModelArtifact::from_bytes(&bytes), Err(Error::Model(_))));
    }

    #[test]
    fn test_predict_dataset_checks_schema() {
        let (dataset, artifact) = fitted();
        let (y, predictions) = artifact.predict_dataset(&dataset).unwrap();
        assert_eq!(y.len(), predictions.len());

        let other = Dataset::from_csv_bytes(b"a,c,target\n1,2,3\n").unwrap();
        let err = artifact.predict_dataset(&other).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }
}

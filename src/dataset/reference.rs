//! Reference diabetes-shaped dataset
//!
//! 442 patients, ten baseline features and a disease-progression target.
//! Features are mean-centred and scaled to unit L2 norm per column; the
//! target is an integer in `[25, 346]`. Values come from a fixed seed, so
//! every materialization writes the same file.

use super::Dataset;
use crate::config::TARGET_COLUMN;
use crate::Result;
use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Number of rows in the reference dataset
pub const N_SAMPLES: usize = 442;

/// Feature columns, in file order
pub const FEATURE_NAMES: [&str; 10] = [
    "age", "sex", "bmi", "bp", "s1", "s2", "s3", "s4", "s5", "s6",
];

const SEED: u64 = 1_990;
const TARGET_MIN: f64 = 25.0;
const TARGET_MAX: f64 = 346.0;
const TARGET_MEAN: f64 = 152.0;
const NOISE_STD: f64 = 54.0;

// (mean, std) of the unscaled baseline measurement; sex is drawn separately
const RAW_MOMENTS: [(f64, f64); 10] = [
    (48.5, 13.1),
    (0.0, 0.0),
    (26.4, 4.4),
    (94.6, 13.8),
    (189.1, 34.6),
    (115.4, 30.4),
    (49.8, 12.9),
    (4.07, 1.29),
    (4.64, 0.52),
    (91.3, 11.5),
];

const COEFFICIENTS: [f64; 10] = [
    -10.0, -239.8, 519.8, 324.4, -792.2, 476.7, 101.0, 177.1, 751.3, 67.6,
];

/// Relative path of the materialized file
#[must_use]
pub fn default_path(root: &Path) -> PathBuf {
    root.join("data").join("raw_data.csv")
}

/// Generate the reference dataset.
///
/// # Errors
///
/// Returns error if the record batch cannot be assembled
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn diabetes() -> Result<Dataset> {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(FEATURE_NAMES.len());
    for (j, &(mean, std)) in RAW_MOMENTS.iter().enumerate() {
        let raw: Vec<f64> = if j == 1 {
            (0..N_SAMPLES)
                .map(|_| if rng.gen_bool(0.47) { 2.0 } else { 1.0 })
                .collect()
        } else {
            let normal = Normal::new(mean, std)
                .map_err(|e| crate::Error::Other(format!("invalid distribution: {e}")))?;
            (0..N_SAMPLES)
                .map(|_| normal.sample(&mut rng).max(mean * 0.2))
                .collect()
        };
        columns.push(scale(&raw));
    }

    let noise = Normal::new(0.0, NOISE_STD)
        .map_err(|e| crate::Error::Other(format!("invalid distribution: {e}")))?;
    let target: Vec<i64> = (0..N_SAMPLES)
        .map(|i| {
            let signal: f64 = COEFFICIENTS
                .iter()
                .zip(&columns)
                .map(|(c, column)| c * column[i])
                .sum();
            let y = TARGET_MEAN + signal + noise.sample(&mut rng);
            y.clamp(TARGET_MIN, TARGET_MAX).round() as i64
        })
        .collect();

    let mut fields: Vec<Field> = FEATURE_NAMES
        .iter()
        .map(|name| Field::new(*name, DataType::Float64, false))
        .collect();
    fields.push(Field::new(TARGET_COLUMN, DataType::Int64, false));

    let mut arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|column| Arc::new(Float64Array::from(column)) as ArrayRef)
        .collect();
    arrays.push(Arc::new(Int64Array::from(target)));

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    Ok(Dataset::new(batch))
}

/// Write the reference dataset to `data/raw_data.csv` under `root`,
/// creating `data/` and replacing any existing file.
///
/// # Errors
///
/// Returns error on filesystem failures
pub fn materialize(root: &Path) -> Result<PathBuf> {
    let path = default_path(root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    diabetes()?.write_csv(&path)?;
    tracing::info!(path = %path.display(), rows = N_SAMPLES, "materialized reference dataset");
    Ok(path)
}

// Mean-centre, then divide by the L2 norm of the centred column.
#[allow(clippy::cast_precision_loss)]
fn scale(raw: &[f64]) -> Vec<f64> {
    let mean = raw.iter().sum::<f64>() / raw.len() as f64;
    let centred: Vec<f64> = raw.iter().map(|x| x - mean).collect();
    let norm = centred.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 {
        return centred;
    }
    centred.into_iter().map(|x| x / norm).collect()
}

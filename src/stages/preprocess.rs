//! Preprocessing stage - deterministic 80/20 split

use crate::config::TARGET_COLUMN;
use crate::dataset::{train_test_split, Dataset, DatasetSchema, SplitSpec};
use crate::Result;
use std::path::Path;

/// Sizes of the written subsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    /// Schema of the input
    pub schema: DatasetSchema,
    /// Training rows written
    pub n_train: usize,
    /// Held-out rows written
    pub n_test: usize,
    /// Columns in each subset
    pub n_columns: usize,
}

/// Split `input` into `train_out` and `test_out` with the fixed ratio and
/// seed.
///
/// # Errors
///
/// Returns [`crate::Error::SchemaMismatch`] if the target column is
/// missing, or a parse, split or write error.
pub fn run(input: &Path, train_out: &Path, test_out: &Path) -> Result<SplitReport> {
    run_with(input, train_out, test_out, SplitSpec::default())
}

/// Split with an explicit ratio and seed.
///
/// # Errors
///
/// See [`run`].
pub fn run_with(
    input: &Path,
    train_out: &Path,
    test_out: &Path,
    spec: SplitSpec,
) -> Result<SplitReport> {
    let dataset = Dataset::read_csv(input)?;
    let schema = DatasetSchema::infer(&dataset, TARGET_COLUMN)?;
    // Fails early on non-numeric columns.
    dataset.features_and_target(&schema)?;

    let (train, test) = train_test_split(&dataset, spec)?;
    train.write_csv(train_out)?;
    test.write_csv(test_out)?;

    tracing::info!(
        input = %input.display(),
        train = train.num_rows(),
        test = test.num_rows(),
        "wrote split"
    );
    Ok(SplitReport {
        schema,
        n_train: train.num_rows(),
        n_test: test.num_rows(),
        n_columns: dataset.num_columns(),
    })
}

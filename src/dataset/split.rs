//! Deterministic train/test split
//!
//! The held-out size is `ceil(test_fraction * n)`; the remaining rows form
//! the training subset. Rows are assigned by a seeded permutation: the
//! first `n_test` positions go to the test subset, the rest to training,
//! so the same input and seed always give the same partition.

use super::Dataset;
use crate::config::{SPLIT_SEED, TEST_FRACTION};
use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Split ratio and seed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitSpec {
    /// Fraction of rows held out, in `(0, 1)`
    pub test_fraction: f64,
    /// Permutation seed
    pub seed: u64,
}

impl Default for SplitSpec {
    fn default() -> Self {
        Self {
            test_fraction: TEST_FRACTION,
            seed: SPLIT_SEED,
        }
    }
}

/// `(n_train, n_test)` for `n` rows.
///
/// # Errors
///
/// Returns [`Error::Split`] if the fraction is outside `(0, 1)` or either
/// subset would be empty.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn split_sizes(n: usize, test_fraction: f64) -> Result<(usize, usize)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(Error::Split(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    let n_test = (test_fraction * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(Error::Split(format!(
            "with n_samples={n} and test_fraction={test_fraction}, \
             the resulting train set would be empty"
        )));
    }

    Ok((n_train, n_test))
}

/// Row positions of the `(train, test)` subsets.
///
/// # Errors
///
/// See [`split_sizes`].
pub fn split_indices(n: usize, spec: SplitSpec) -> Result<(Vec<usize>, Vec<usize>)> {
    let (_, n_test) = split_sizes(n, spec.test_fraction)?;

    let mut permutation: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
    permutation.shuffle(&mut rng);

    let train = permutation.split_off(n_test);
    Ok((train, permutation))
}

/// Partition `dataset` into `(train, test)`.
///
/// # Errors
///
/// See [`split_sizes`].
pub fn train_test_split(dataset: &Dataset, spec: SplitSpec) -> Result<(Dataset, Dataset)> {
    let (train_idx, test_idx) = split_indices(dataset.num_rows(), spec)?;
    tracing::debug!(
        train = train_idx.len(),
        test = test_idx.len(),
        seed = spec.seed,
        "split dataset"
    );
    Ok((dataset.take(&train_idx)?, dataset.take(&test_idx)?))
}

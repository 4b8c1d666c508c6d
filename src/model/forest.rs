//! Random forest regressor
//!
//! Bagged CART trees. Per-tree seeds are drawn up front from a single
//! seeded generator, so fitting the trees in parallel yields the same
//! forest as fitting them one after another.

use super::tree::{DecisionTreeRegressor, TreeParams};
use super::Regressor;
use crate::config::{FOREST_SEED, N_ESTIMATORS};
use crate::dataset::FeatureMatrix;
use crate::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Forest configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Seed for bootstrap sampling and feature subsampling
    pub random_state: u64,
    /// Fit each tree on a bootstrap sample instead of the full set
    pub bootstrap: bool,
    /// Per-tree growth limits
    pub tree: TreeParams,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: N_ESTIMATORS,
            random_state: FOREST_SEED,
            bootstrap: true,
            tree: TreeParams::default(),
        }
    }
}

impl ForestParams {
    /// Parameters as `(name, value)` strings, in a stable order.
    #[must_use]
    pub fn as_pairs(&self) -> Vec<(&'static str, String)> {
        let max_depth = self
            .tree
            .max_depth
            .map_or_else(|| "None".to_string(), |d| d.to_string());
        let max_features = self
            .tree
            .max_features
            .map_or_else(|| "1.0".to_string(), |k| k.to_string());
        vec![
            ("n_estimators", self.n_estimators.to_string()),
            ("random_state", self.random_state.to_string()),
            ("criterion", "squared_error".to_string()),
            ("max_depth", max_depth),
            ("min_samples_split", self.tree.min_samples_split.to_string()),
            ("min_samples_leaf", self.tree.min_samples_leaf.to_string()),
            ("max_features", max_features),
            ("bootstrap", self.bootstrap.to_string()),
        ]
    }
}

/// Fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<DecisionTreeRegressor>,
    n_features: usize,
}

impl RandomForestRegressor {
    /// Fit a forest on every row of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] on empty input, mismatched target length or
    /// `n_estimators == 0`.
    pub fn fit(params: ForestParams, x: &FeatureMatrix, y: &[f64]) -> Result<Self> {
        if params.n_estimators == 0 {
            return Err(Error::Model("n_estimators must be at least 1".to_string()));
        }
        if x.n_rows() == 0 {
            return Err(Error::Model("cannot fit on an empty training set".to_string()));
        }
        if y.len() != x.n_rows() {
            return Err(Error::Model(format!(
                "{} target values for {} rows",
                y.len(),
                x.n_rows()
            )));
        }

        let mut master = ChaCha8Rng::seed_from_u64(params.random_state);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.gen()).collect();
        let n = x.n_rows();

        let trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let samples: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTreeRegressor::fit(x, y, &samples, &params.tree, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            trees = trees.len(),
            rows = n,
            features = x.n_cols(),
            "fitted random forest"
        );

        Ok(Self {
            params,
            trees,
            n_features: x.n_cols(),
        })
    }

    /// Configuration the forest was fit with.
    #[must_use]
    pub const fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }

    /// Number of features the forest was fit on.
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Check a forest read from outside against the feature count of its
    /// schema; see [`DecisionTreeRegressor::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] if the forest is empty or malformed
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.trees.is_empty() {
            return Err(Error::Model("forest has no trees".to_string()));
        }
        if self.n_features != n_features {
            return Err(Error::Model(format!(
                "forest was fit on {} features, schema has {n_features}",
                self.n_features
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features).map_err(|e| match e {
                Error::Model(msg) => Error::Model(format!("tree {i}: {msg}")),
                other => other,
            })?;
        }
        Ok(())
    }
}

impl Regressor for RandomForestRegressor {
    #[allow(clippy::cast_precision_loss)]
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        if x.n_cols() != self.n_features {
            return Err(Error::Model(format!(
                "forest expects {} features, got {}",
                self.n_features,
                x.n_cols()
            )));
        }
        let n_trees = self.trees.len() as f64;
        Ok((0..x.n_rows())
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|tree| tree.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect())
    }
}

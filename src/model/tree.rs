//! CART regression tree (squared-error criterion)

use super::Regressor;
use crate::dataset::FeatureMatrix;
use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

// Values closer than this are treated as equal when placing thresholds
const FEATURE_THRESHOLD: f64 = 1e-7;

/// Growth limits of a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth, unlimited when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs before it may split
    pub min_samples_split: usize,
    /// Minimum samples each child must keep
    pub min_samples_leaf: usize,
    /// Features examined per split, all when `None`
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// A tree node; children are indices into the node arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Terminal node predicting the mean target of its samples
    Leaf {
        /// Predicted value
        value: f64,
    },
    /// Internal node: `x[feature] <= threshold` goes left
    Split {
        /// Feature column
        feature: usize,
        /// Split point
        threshold: f64,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
    },
}

/// Fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    nodes: Vec<Node>,
    n_features: usize,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    score: f64,
    split_at: usize,
    order: Vec<usize>,
}

impl DecisionTreeRegressor {
    /// Grow a tree on the rows listed in `samples` (repeats allowed, as
    /// produced by bootstrap sampling).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] if `samples` is empty, `y` does not match
    /// `x`, or a sample index is out of range.
    pub fn fit<R: Rng>(
        x: &FeatureMatrix,
        y: &[f64],
        samples: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Result<Self> {
        if y.len() != x.n_rows() {
            return Err(Error::Model(format!(
                "{} target values for {} rows",
                y.len(),
                x.n_rows()
            )));
        }
        if x.n_cols() == 0 {
            return Err(Error::Model("cannot fit a tree without features".to_string()));
        }
        if samples.is_empty() {
            return Err(Error::Model("cannot fit a tree on zero samples".to_string()));
        }
        if samples.iter().any(|&i| i >= x.n_rows()) {
            return Err(Error::Model("sample index out of range".to_string()));
        }

        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![(0_usize, samples.to_vec(), 0_usize)];

        while let Some((node_id, indices, depth)) = stack.pop() {
            let value = mean_of(y, &indices);
            let can_split = indices.len() >= params.min_samples_split.max(2)
                && indices.len() >= 2 * params.min_samples_leaf.max(1)
                && params.max_depth.map_or(true, |max| depth < max)
                && !is_constant(y, &indices);

            let best = if can_split {
                best_split(x, y, &indices, params, rng)
            } else {
                None
            };

            match best {
                Some(candidate) => {
                    let (left_rows, right_rows) = candidate.order.split_at(candidate.split_at);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes[node_id] = Node::Split {
                        feature: candidate.feature,
                        threshold: candidate.threshold,
                        left,
                        right,
                    };
                    stack.push((right, right_rows.to_vec(), depth + 1));
                    stack.push((left, left_rows.to_vec(), depth + 1));
                }
                None => nodes[node_id] = Node::Leaf { value },
            }
        }

        Ok(Self {
            nodes,
            n_features: x.n_cols(),
        })
    }

    /// Check a tree read from outside: it must have a root, split on
    /// features below `n_features`, and every child must come after its
    /// parent in the arena so that each walk from the root ends at a leaf.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] naming the first offending node
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Model("tree has no nodes".to_string()));
        }
        if self.n_features != n_features {
            return Err(Error::Model(format!(
                "tree was fit on {} features, expected {n_features}",
                self.n_features
            )));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                if feature >= n_features {
                    return Err(Error::Model(format!(
                        "node {id} splits on feature {feature} of {n_features}"
                    )));
                }
                if let Some(child) = [left, right]
                    .into_iter()
                    .find(|&child| child <= id || child >= self.nodes.len())
                {
                    return Err(Error::Model(format!(
                        "node {id} has child {child} outside {}..{}",
                        id + 1,
                        self.nodes.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Predict a single row.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => id = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }

    /// Number of nodes, leaves included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf (a single leaf has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0_usize, 0_usize)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = self.nodes[id] {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        max_depth
    }

    /// Number of features the tree was fit on.
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Regressor for DecisionTreeRegressor {
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        if x.n_cols() != self.n_features {
            return Err(Error::Model(format!(
                "tree expects {} features, got {}",
                self.n_features,
                x.n_cols()
            )));
        }
        Ok((0..x.n_rows()).map(|i| self.predict_row(x.row(i))).collect())
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_of(y: &[f64], indices: &[usize]) -> f64 {
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}

fn is_constant(y: &[f64], indices: &[usize]) -> bool {
    let first = y[indices[0]];
    indices.iter().all(|&i| y[i] == first)
}

// Maximizes sum_l^2 / n_l + sum_r^2 / n_r, which is equivalent to
// minimizing the children's summed squared error.
#[allow(clippy::cast_precision_loss)]
fn best_split<R: Rng>(
    x: &FeatureMatrix,
    y: &[f64],
    indices: &[usize],
    params: &TreeParams,
    rng: &mut R,
) -> Option<Candidate> {
    let n = indices.len();
    let n_features = x.n_cols();
    let k = params.max_features.unwrap_or(n_features).clamp(1, n_features);
    let features: Vec<usize> = if k < n_features {
        rand::seq::index::sample(rng, n_features, k).into_vec()
    } else {
        (0..n_features).collect()
    };

    let total: f64 = indices.iter().map(|&i| y[i]).sum();
    let parent_score = total * total / n as f64;
    let min_leaf = params.min_samples_leaf.max(1);

    let mut best: Option<Candidate> = None;
    for feature in features {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));

        let mut left_sum = 0.0;
        let mut best_here: Option<(f64, usize)> = None;
        for pos in 1..n {
            left_sum += y[order[pos - 1]];
            if pos < min_leaf || n - pos < min_leaf {
                continue;
            }
            let lo = x.get(order[pos - 1], feature);
            let hi = x.get(order[pos], feature);
            if hi <= lo + FEATURE_THRESHOLD {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / pos as f64 + right_sum * right_sum / (n - pos) as f64;
            if best_here.map_or(true, |(s, _)| score > s) {
                best_here = Some((score, pos));
            }
        }

        if let Some((score, pos)) = best_here {
            let improves = score > parent_score + parent_score.abs() * f64::EPSILON;
            let beats = best.as_ref().map_or(true, |b| score > b.score);
            if improves && beats {
                let lo = x.get(order[pos - 1], feature);
                let hi = x.get(order[pos], feature);
                let mut threshold = (lo + hi) / 2.0;
                if threshold >= hi || !threshold.is_finite() {
                    threshold = lo;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    score,
                    split_at: pos,
                    order,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fit_all(x: &FeatureMatrix, y: &[f64], params: &TreeParams) -> DecisionTreeRegressor {
        let samples: Vec<usize> = (0..y.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        DecisionTreeRegressor::fit(x, y, &samples, params, &mut rng).unwrap()
    }

    #[test]
    fn test_step_function_learned_exactly() {
        let x = FeatureMatrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0], vec![4.0]]).unwrap();
        let y = [10.0, 10.0, 20.0, 20.0];
        let tree = fit_all(&x, &y, &TreeParams::default());

        assert_eq!(tree.predict(&x).unwrap(), y.to_vec());
        assert_eq!(tree.depth(), 1);
        assert!((tree.predict_row(&[2.4]) - 10.0).abs() < f64::EPSILON);
        assert!((tree.predict_row(&[2.6]) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unlimited_depth_memorizes_distinct_rows() {
        let rows: Vec<Vec<f64>> = (0..20_i32).map(|i| vec![f64::from(i), f64::from(i % 3)]).collect();
        let x = FeatureMatrix::from_rows(&rows).unwrap();
        let y: Vec<f64> = (0..20_i32).map(|i| f64::from(i * i)).collect();
        let tree = fit_all(&x, &y, &TreeParams::default());
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_max_depth_respected() {
        let rows: Vec<Vec<f64>> = (0..32_i32).map(|i| vec![f64::from(i)]).collect();
        let x = FeatureMatrix::from_rows(&rows).unwrap();
        let y: Vec<f64> = (0..32_i32).map(f64::from).collect();
        let params = TreeParams {
            max_depth: Some(2),
            ..TreeParams::default()
        };
        let tree = fit_all(&x, &y, &params);
        assert!(tree.depth() <= 2);
        assert!(tree.node_count() <= 7);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = FeatureMatrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let tree = fit_all(&x, &[5.0, 5.0, 5.0], &TreeParams::default());
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_identical_features_cannot_split() {
        let x = FeatureMatrix::from_rows(&[vec![1.0], vec![1.0]]).unwrap();
        let tree = fit_all(&x, &[0.0, 2.0], &TreeParams::default());
        assert_eq!(tree.node_count(), 1);
        assert!((tree.predict_row(&[1.0]) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_feature_count_checked() {
        let x = FeatureMatrix::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
        let tree = fit_all(&x, &[0.0, 1.0], &TreeParams::default());
        let wide = FeatureMatrix::from_rows(&[vec![1.0, 2.0]]).unwrap();
        assert!(tree.predict(&wide).is_err());
    }

    #[test]
    fn test_fitted_tree_validates() {
        let rows: Vec<Vec<f64>> = (0..16_i32).map(|i| vec![f64::from(i), f64::from(i % 4)]).collect();
        let x = FeatureMatrix::from_rows(&rows).unwrap();
        let y: Vec<f64> = (0..16_i32).map(|i| f64::from(i * 3 % 7)).collect();
        let tree = fit_all(&x, &y, &TreeParams::default());
        assert!(tree.node_count() > 1);
        tree.validate(2).unwrap();
        assert!(tree.validate(3).is_err());
    }

    #[test]
    fn test_malformed_arenas_rejected() {
        let split = |feature, left, right| Node::Split {
            feature,
            threshold: 0.5,
            left,
            right,
        };
        let leaf = Node::Leaf { value: 1.0 };
        let cases = [
            vec![],
            vec![split(0, 0, 0)],
            vec![split(0, 1, 2), leaf.clone(), split(0, 1, 1)],
            vec![split(0, 1, 9), leaf.clone()],
            vec![split(4, 1, 2), leaf.clone(), leaf],
        ];
        for nodes in cases {
            let tree = DecisionTreeRegressor {
                nodes,
                n_features: 1,
            };
            assert!(matches!(tree.validate(1), Err(Error::Model(_))), "{tree:?}");
        }
    }

    #[test]
    fn test_empty_samples_rejected() {
        let x = FeatureMatrix::from_rows(&[vec![1.0]]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let result = DecisionTreeRegressor::fit(&x, &[1.0], &[], &TreeParams::default(), &mut rng);
        assert!(matches!(result, Err(Error::Model(_))));
    }
}

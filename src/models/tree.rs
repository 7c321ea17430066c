//! CART regression tree.
//!
//! Splits minimize the summed squared error of the two children. For a node
//! with `n` samples and target sum `S`, that is the same as maximizing
//!
//! ```text
//! S_left² / n_left + S_right² / n_right
//! ```
//!
//! which only needs running sums while sweeping the samples sorted by one
//! feature. Thresholds sit halfway between two consecutive distinct values and
//! samples with `x <= threshold` go left. Leaves predict the mean target.
//!
//! Nodes live in a flat vector and the tree is grown with an explicit stack, so
//! deep trees on large tables never recurse.

use nalgebra::DMatrix;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of features drawn at each node (all features when equal to the width).
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` listed in `samples` (duplicates allowed).
    ///
    /// `samples` must be non-empty and every index must be a row of `x`.
    pub fn fit<R: Rng>(x: &DMatrix<f64>, y: &[f64], samples: &[usize], params: &TreeParams, rng: &mut R) -> Self {
        let n_features = x.ncols();
        let max_features = params.max_features.clamp(1, n_features.max(1));
        let min_leaf = params.min_samples_leaf.max(1);
        let min_split = params.min_samples_split.max(2);

        let mut idx = samples.to_vec();
        let mut order: Vec<usize> = Vec::with_capacity(idx.len());
        let mut features: Vec<usize> = (0..n_features).collect();
        let mut nodes = vec![Node::Leaf { value: 0.0 }];

        // (node, start, end, depth) over `idx`.
        let mut stack = vec![(0usize, 0usize, idx.len(), 0usize)];

        while let Some((node, start, end, depth)) = stack.pop() {
            let part = &mut idx[start..end];
            let n = part.len();

            let mut sum = 0.0;
            let mut y_min = f64::INFINITY;
            let mut y_max = f64::NEG_INFINITY;
            for &i in part.iter() {
                sum += y[i];
                y_min = y_min.min(y[i]);
                y_max = y_max.max(y[i]);
            }
            let mean = sum / n as f64;

            let depth_ok = params.max_depth.is_none_or(|d| depth < d);
            if n < min_split || n < 2 * min_leaf || !depth_ok || y_min == y_max || n_features == 0 {
                nodes[node] = Node::Leaf { value: mean };
                continue;
            }

            if max_features < n_features {
                features.shuffle(rng);
            }

            let mut best: Option<BestSplit> = None;
            for &f in &features[..max_features] {
                let col = x.column(f);
                order.clear();
                order.extend_from_slice(part);
                order.sort_by(|&a, &b| col[a].total_cmp(&col[b]));

                let mut left_sum = 0.0;
                for k in 0..n - 1 {
                    left_sum += y[order[k]];
                    let n_left = k + 1;
                    let n_right = n - n_left;
                    if n_left < min_leaf || n_right < min_leaf {
                        continue;
                    }
                    let here = col[order[k]];
                    let next = col[order[k + 1]];
                    if next <= here {
                        continue;
                    }
                    let right_sum = sum - left_sum;
                    let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
                    if best.is_none_or(|b| score > b.score) {
                        let mid = here + (next - here) / 2.0;
                        // Halfway can round up to `next` for adjacent floats.
                        let threshold = if mid < next { mid } else { here };
                        best = Some(BestSplit {
                            feature: f,
                            threshold,
                            score,
                        });
                    }
                }
            }

            let Some(split) = best else {
                nodes[node] = Node::Leaf { value: mean };
                continue;
            };

            let col = x.column(split.feature);
            let mut mid = 0;
            for k in 0..n {
                if col[part[k]] <= split.threshold {
                    part.swap(k, mid);
                    mid += 1;
                }
            }

            let left = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });
            let right = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            stack.push((right, start + mid, end, depth + 1));
            stack.push((left, start, start + mid, depth + 1));
        }

        Self { nodes }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes[at] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    /// Check the node layout of a deserialized tree.
    ///
    /// Children are always stored after their parent, so requiring
    /// `node < child < nodes.len()` also rules out cycles.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (at, node) in self.nodes.iter().enumerate() {
            let Node::Split {
                feature, left, right, ..
            } = *node
            else {
                continue;
            };
            if feature >= n_features {
                return Err(format!("node {at} splits on feature {feature} of {n_features}"));
            }
            for child in [left, right] {
                if child <= at || child >= self.nodes.len() {
                    return Err(format!(
                        "node {at} points to node {child} (tree has {} nodes)",
                        self.nodes.len()
                    ));
                }
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }

    #[test]
    fn fits_a_step_function_exactly() {
        let xs = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0];
        let y = [5.0, 5.0, 5.0, 50.0, 50.0, 50.0];
        let x = DMatrix::from_column_slice(6, 1, &xs);
        let samples: Vec<usize> = (0..6).collect();
        let mut rng = StdRng::seed_from_u64(0);

        let tree = RegressionTree::fit(&x, &y, &samples, &params(), &mut rng);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict_row(&[2.5]), 5.0);
        assert_eq!(tree.predict_row(&[6.5]), 5.0);
        assert_eq!(tree.predict_row(&[6.6]), 50.0);
        assert_eq!(tree.predict_row(&[100.0]), 50.0);
    }

    #[test]
    fn picks_the_informative_feature() {
        // Column 0 is noise, column 1 carries the signal.
        let rows = [
            [3.0, 0.0, 10.0],
            [1.0, 0.0, 10.0],
            [2.0, 0.0, 10.0],
            [3.0, 1.0, 30.0],
            [1.0, 1.0, 30.0],
            [2.0, 1.0, 30.0],
        ];
        let x = DMatrix::from_fn(6, 2, |i, j| rows[i][j]);
        let y: Vec<f64> = rows.iter().map(|r| r[2]).collect();
        let samples: Vec<usize> = (0..6).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let tree = RegressionTree::fit(&x, &y, &samples, &params(), &mut rng);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict_row(&[9.0, 0.0]), 10.0);
        assert_eq!(tree.predict_row(&[9.0, 1.0]), 30.0);
    }

    #[test]
    fn depth_limit_and_constant_targets_make_leaves() {
        let x = DMatrix::from_column_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);
        let samples: Vec<usize> = (0..4).collect();
        let mut rng = StdRng::seed_from_u64(1);

        let stump = TreeParams {
            max_depth: Some(0),
            ..params()
        };
        let tree = RegressionTree::fit(&x, &[1.0, 2.0, 3.0, 6.0], &samples, &stump, &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(&[1.0]), 3.0);

        let flat = RegressionTree::fit(&x, &[7.0; 4], &samples, &params(), &mut rng);
        assert_eq!(flat.leaf_count(), 1);
    }

    #[test]
    fn fitted_trees_validate() {
        let x = DMatrix::from_column_slice(6, 1, &[1.0, 2.0, 3.0, 10.0, 11.0, 12.0]);
        let samples: Vec<usize> = (0..6).collect();
        let mut rng = StdRng::seed_from_u64(2);
        let tree = RegressionTree::fit(&x, &[5.0, 5.0, 6.0, 50.0, 51.0, 50.0], &samples, &params(), &mut rng);
        assert_eq!(tree.validate(1), Ok(()));
        assert!(tree.validate(0).is_err());
    }

    #[test]
    fn broken_layouts_are_rejected() {
        let leaf = Node::Leaf { value: 1.0 };
        let split = |left, right| Node::Split {
            feature: 0,
            threshold: 0.5,
            left,
            right,
        };

        assert!(RegressionTree::from_nodes(vec![]).validate(1).is_err());
        assert!(RegressionTree::from_nodes(vec![split(7, 9)]).validate(1).is_err());
        assert!(RegressionTree::from_nodes(vec![split(0, 1), leaf]).validate(1).is_err());
        assert!(
            RegressionTree::from_nodes(vec![split(1, 2), split(0, 2), leaf])
                .validate(1)
                .is_err()
        );
        assert_eq!(RegressionTree::from_nodes(vec![split(1, 2), leaf, leaf]).validate(1), Ok(()));
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let x = DMatrix::from_column_slice(5, 1, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = [0.0, 100.0, 100.0, 100.0, 100.0];
        let samples: Vec<usize> = (0..5).collect();
        let mut rng = StdRng::seed_from_u64(3);

        let p = TreeParams {
            min_samples_leaf: 2,
            ..params()
        };
        let tree = RegressionTree::fit(&x, &y, &samples, &p, &mut rng);
        // The lone 0.0 cannot be isolated, so x=1 lands in a leaf with a neighbour.
        assert_eq!(tree.predict_row(&[1.0]), 50.0);
    }

    #[test]
    fn bootstrap_duplicates_are_weighted() {
        let x = DMatrix::from_column_slice(2, 1, &[1.0, 1.0]);
        let y = [10.0, 40.0];
        let mut rng = StdRng::seed_from_u64(0);
        // Row 1 drawn three times: identical x, so a single leaf with the weighted mean.
        let tree = RegressionTree::fit(&x, &y, &[0, 1, 1, 1], &params(), &mut rng);
        assert_eq!(tree.predict_row(&[1.0]), 32.5);
    }
}

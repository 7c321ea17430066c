//! Random forest regressor: bootstrap-aggregated CART trees.
//!
//! Each tree draws its own bootstrap sample (with replacement, same size as the
//! training set) from an RNG seeded with `seed + tree_index`, so the forest is
//! reproducible regardless of how rayon schedules the trees.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::ForestParams;
use crate::error::AppError;
use crate::models::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(x: &DMatrix<f64>, y: &[f64], params: &ForestParams, seed: u64) -> Result<Self, AppError> {
        let n = x.nrows();
        if n == 0 {
            return Err(AppError::new(3, "No rows to fit the forest on."));
        }
        if y.len() != n {
            return Err(AppError::new(
                4,
                format!("Target length {} does not match {n} feature rows.", y.len()),
            ));
        }
        if params.n_trees == 0 {
            return Err(AppError::new(2, "Forest needs at least one tree."));
        }
        if !(params.max_features.is_finite() && params.max_features > 0.0 && params.max_features <= 1.0) {
            return Err(AppError::new(
                2,
                format!("Invalid max_features {} (must be in (0, 1]).", params.max_features),
            ));
        }

        let n_features = x.ncols();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: ((params.max_features * n_features as f64) as usize).max(1),
        };

        let trees: Vec<RegressionTree> = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, &samples, &tree_params, &mut rng)
            })
            .collect();

        Ok(Self { trees, n_features })
    }

    /// Width of the input rows the forest was fitted on.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Structural check of every tree, for forests read back from disk.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features).map_err(|e| format!("tree {t}: {e}"))?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_trees(trees: Vec<RegressionTree>, n_features: usize) -> Self {
        Self { trees, n_features }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the tree predictions. `row` must have `n_features()` values.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> Vec<f64> {
        let mut row = vec![0.0; x.ncols()];
        (0..x.nrows())
            .map(|i| {
                for (j, v) in row.iter_mut().enumerate() {
                    *v = x[(i, j)];
                }
                self.predict_row(&row)
            })
            .collect()
    }
}

//! Random forest regressor.

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeConfig};
use super::{check_predict_input, check_training_input, ModelError, Regressor};

/// Random Forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree (None = unlimited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Max features per split (None = all)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_features: Option<usize>,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// Random Forest model
#[derive(Debug, Clone, Default)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn tree_config(&self, index: usize) -> TreeConfig {
        TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: self.config.max_features,
            seed: self.config.seed.wrapping_add(index as u64),
        }
    }
}

/// Draw `n` row indices with replacement.
fn bootstrap_rows(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

impl Regressor for RandomForest {
    fn fit(&mut self, features: &Array2<f64>, target: &Array1<f64>) -> Result<(), ModelError> {
        check_training_input(features, target)?;
        if self.config.n_trees == 0 {
            return Err(ModelError::InvalidInput(
                "forest needs at least one tree".to_string(),
            ));
        }

        let n_rows = features.nrows();
        let columns: Vec<usize> = (0..features.ncols()).collect();

        // Build trees in parallel; results are collected in index order
        let trees: Result<Vec<DecisionTree>, ModelError> = (0..self.config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut tree = DecisionTree::new(self.tree_config(i));
                let rows = if self.config.bootstrap {
                    bootstrap_rows(n_rows, self.config.seed.wrapping_add(i as u64))
                } else {
                    (0..n_rows).collect()
                };
                tree.fit_rows(features, target, rows, &columns)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.n_features = features.ncols();
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_predict_input(features, self.n_features)?;

        let n_trees = self.trees.len() as f64;
        features
            .rows()
            .into_iter()
            .map(|row| {
                let row = row.to_vec();
                let mut sum = 0.0;
                for tree in &self.trees {
                    sum += tree.predict_row(&row)?;
                }
                Ok(sum / n_trees)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_trees: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_bootstrap_is_seeded() {
        assert_eq!(bootstrap_rows(50, 7), bootstrap_rows(50, 7));
        assert_ne!(bootstrap_rows(50, 7), bootstrap_rows(50, 8));
        assert!(bootstrap_rows(50, 7).iter().all(|&r| r < 50));
    }

    #[test]
    fn test_fit_predict_tracks_target() {
        let x = Array2::from_shape_fn((100, 2), |(i, j)| i as f64 + j as f64);
        let y: Array1<f64> = (0..100).map(|i| 2.0 * i as f64).collect();

        let mut forest = RandomForest::new(small_config());
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.n_trees(), 20);

        let pred = forest.predict_one(&[50.0, 51.0]).unwrap();
        assert!((pred - 100.0).abs() < 10.0, "pred = {pred}");
    }

    #[test]
    fn test_deterministic_with_seed() {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| ((i * 3 + j * 5) % 23) as f64);
        let y: Array1<f64> = (0..60).map(|i| ((i * 7) % 13) as f64).collect();

        let mut a = RandomForest::new(small_config());
        let mut b = RandomForest::new(small_config());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_constant_target() {
        let x = Array2::from_shape_fn((30, 4), |(i, _)| i as f64);
        let y = Array1::from_elem(30, 25.0);

        let mut forest = RandomForest::new(small_config());
        forest.fit(&x, &y).unwrap();
        assert!((forest.predict_one(&[1.0, 2.0, 3.0, 4.0]).unwrap() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_trees_rejected() {
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 0,
            ..Default::default()
        });
        let x = Array2::zeros((3, 1));
        let y = Array1::zeros(3);
        assert!(matches!(forest.fit(&x, &y), Err(ModelError::InvalidInput(_))));
        assert_eq!(forest.predict_one(&[0.0]), Err(ModelError::NotFitted));
    }
}

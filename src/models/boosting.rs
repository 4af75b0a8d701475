//! Gradient boosted regression trees.
//!
//! Squared-error boosting: start from the target mean, then fit each shallow
//! tree to the current residuals and add it with shrinkage. Every round
//! draws a row subsample (without replacement) and a column subsample from
//! one seeded generator, so the ensemble is reproducible.

use ndarray::{Array1, Array2};
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{DecisionTree, TreeConfig};
use super::{check_predict_input, check_training_input, ModelError, Regressor};

/// Boosting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingConfig {
    /// Number of boosting iterations (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples required in a leaf node
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn for each tree
    pub subsample: f64,
    /// Fraction of columns drawn for each tree
    pub colsample: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.05,
            max_depth: 4,
            min_samples_leaf: 1,
            subsample: 0.8,
            colsample: 0.8,
            seed: 42,
        }
    }
}

impl BoostingConfig {
    fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidInput(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ModelError::InvalidInput(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        for (name, value) in [("subsample", self.subsample), ("colsample", self.colsample)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ModelError::InvalidInput(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Number of items kept when sampling `fraction` of `n` (at least one).
fn sample_size(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).round() as usize).clamp(1, n)
}

/// Gradient boosting regressor
#[derive(Debug, Clone, Default)]
pub struct GradientBoosting {
    config: BoostingConfig,
    base_score: f64,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl GradientBoosting {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            base_score: 0.0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &BoostingConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn predict_slice(&self, row: &[f64]) -> Result<f64, ModelError> {
        let mut value = self.base_score;
        for tree in &self.trees {
            value += self.config.learning_rate * tree.predict_row(row)?;
        }
        Ok(value)
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, features: &Array2<f64>, target: &Array1<f64>) -> Result<(), ModelError> {
        check_training_input(features, target)?;
        self.config.validate()?;

        let n_rows = features.nrows();
        let n_cols = features.ncols();
        let n_sub_rows = sample_size(n_rows, self.config.subsample);
        let n_sub_cols = sample_size(n_cols, self.config.colsample);

        let base_score = target.mean().ok_or(ModelError::EmptyTrainingSet)?;
        let mut current = Array1::from_elem(n_rows, base_score);
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut trees = Vec::with_capacity(self.config.n_estimators);
        let mut all_columns: Vec<usize> = (0..n_cols).collect();

        for round in 0..self.config.n_estimators {
            let residuals = target - &current;

            let rows = index::sample(&mut rng, n_rows, n_sub_rows).into_vec();
            all_columns.shuffle(&mut rng);
            let mut columns = all_columns[..n_sub_cols].to_vec();
            columns.sort_unstable();

            let mut tree = DecisionTree::new(TreeConfig {
                max_depth: Some(self.config.max_depth),
                min_samples_split: 2,
                min_samples_leaf: self.config.min_samples_leaf,
                max_features: None,
                seed: self.config.seed.wrapping_add(round as u64),
            });
            tree.fit_rows(features, &residuals, rows, &columns)?;

            for (i, row) in features.rows().into_iter().enumerate() {
                current[i] += self.config.learning_rate * tree.predict_row(&row.to_vec())?;
            }
            trees.push(tree);
        }

        debug!(
            "Boosting fitted {} trees on {} rows ({} per tree, {} of {} columns)",
            trees.len(),
            n_rows,
            n_sub_rows,
            n_sub_cols,
            n_cols
        );

        self.base_score = base_score;
        self.trees = trees;
        self.n_features = n_cols;
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_predict_input(features, self.n_features)?;

        features
            .rows()
            .into_iter()
            .map(|row| self.predict_slice(&row.to_vec()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> BoostingConfig {
        BoostingConfig {
            n_estimators: 50,
            learning_rate: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn test_sample_size() {
        assert_eq!(sample_size(10, 0.8), 8);
        assert_eq!(sample_size(4, 0.8), 3);
        assert_eq!(sample_size(1, 0.1), 1);
        assert_eq!(sample_size(5, 1.0), 5);
    }

    #[test]
    fn test_reduces_training_error() {
        let x = Array2::from_shape_fn((80, 2), |(i, j)| i as f64 + 0.5 * j as f64);
        let y: Array1<f64> = (0..80).map(|i| (i as f64 / 10.0).powi(2)).collect();

        let mut model = GradientBoosting::new(small_config());
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 50);

        let mean = y.mean().unwrap();
        let baseline: f64 = y.iter().map(|v| (v - mean).abs()).sum::<f64>() / 80.0;
        let pred = model.predict(&x).unwrap();
        let mae: f64 = pred
            .iter()
            .zip(y.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / 80.0;
        assert!(mae < baseline / 5.0, "mae {mae} vs baseline {baseline}");
    }

    #[test]
    fn test_constant_target_stays_constant() {
        let x = Array2::from_shape_fn((30, 4), |(i, j)| (i + j) as f64);
        let y = Array1::from_elem(30, 25.0);

        let mut model = GradientBoosting::new(small_config());
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict_one(&[0.0, 1.0, 2.0, 3.0]).unwrap(), 25.0);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let x = Array2::from_shape_fn((50, 3), |(i, j)| ((i * 11 + j * 3) % 19) as f64);
        let y: Array1<f64> = (0..50).map(|i| ((i * 3) % 7) as f64).collect();

        let mut a = GradientBoosting::new(small_config());
        let mut b = GradientBoosting::new(small_config());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_invalid_parameters() {
        let x = Array2::zeros((4, 1));
        let y = Array1::zeros(4);
        for config in [
            BoostingConfig { subsample: 0.0, ..Default::default() },
            BoostingConfig { colsample: 1.5, ..Default::default() },
            BoostingConfig { learning_rate: -0.1, ..Default::default() },
            BoostingConfig { n_estimators: 0, ..Default::default() },
        ] {
            let mut model = GradientBoosting::new(config);
            assert!(matches!(model.fit(&x, &y), Err(ModelError::InvalidInput(_))));
        }
    }
}

//! Regression models.
//!
//! Every model implements the `Regressor` capability (fit on a feature
//! matrix, predict one value per row). The engine never depends on a
//! concrete algorithm; the registry decides which ones run.
//!
//! - [`LinearRegression`] - ordinary least squares
//! - [`DecisionTree`] - CART regression tree
//! - [`RandomForest`] - bagged regression trees
//! - [`GradientBoosting`] - boosted shallow trees with row/column sampling

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod registry;
pub mod tree;

use std::fmt;

use ndarray::{Array1, Array2};
use thiserror::Error;

use crate::error::{ForecastError, ForecastResult};

pub use boosting::{BoostingConfig, GradientBoosting};
pub use forest::{ForestConfig, RandomForest};
pub use linear::{LinearConfig, LinearRegression};
pub use registry::{
    default_model_specs, ModelFactory, ModelRegistry, ModelSource, ModelSpec, NamedModelSpec,
    RegisteredModel,
};
pub use tree::{DecisionTree, TreeConfig};

/// Errors raised by a regressor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Model has not been fitted yet")]
    NotFitted,

    #[error("Matrix is singular and cannot be inverted")]
    SingularMatrix,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Regression capability shared by all models.
///
/// `fit` replaces any previously learned state, so a model can be re-fit
/// from scratch on a new training context.
pub trait Regressor: Send + Sync + fmt::Debug {
    /// Fit on `features` (rows x columns) and `target` (one value per row).
    fn fit(&mut self, features: &Array2<f64>, target: &Array1<f64>) -> Result<(), ModelError>;

    /// Predict one value per feature row.
    fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>, ModelError>;

    /// Predict a single feature vector.
    fn predict_one(&self, features: &[f64]) -> Result<f64, ModelError> {
        let x = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| ModelError::InvalidInput(e.to_string()))?;
        let y = self.predict(&x)?;
        y.first()
            .copied()
            .ok_or_else(|| ModelError::InvalidInput("empty prediction".to_string()))
    }
}

/// Check a training set before fitting.
pub(crate) fn check_training_input(
    features: &Array2<f64>,
    target: &Array1<f64>,
) -> Result<(), ModelError> {
    if features.nrows() != target.len() {
        return Err(ModelError::DimensionMismatch {
            expected: features.nrows(),
            got: target.len(),
        });
    }
    if features.nrows() == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    if features.iter().chain(target.iter()).any(|v| !v.is_finite()) {
        return Err(ModelError::InvalidInput(
            "training data contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Check a prediction matrix against the fitted width.
pub(crate) fn check_predict_input(
    features: &Array2<f64>,
    n_features: usize,
) -> Result<(), ModelError> {
    if features.ncols() != n_features {
        return Err(ModelError::DimensionMismatch {
            expected: n_features,
            got: features.ncols(),
        });
    }
    Ok(())
}

/// A named, independently stateful regressor.
#[derive(Debug)]
pub struct ModelHandle {
    name: String,
    regressor: Box<dyn Regressor>,
}

impl ModelHandle {
    pub fn new(name: impl Into<String>, regressor: Box<dyn Regressor>) -> Self {
        Self {
            name: name.into(),
            regressor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn regressor(&self) -> &dyn Regressor {
        self.regressor.as_ref()
    }

    /// Fit the wrapped model, tagging failures with the model name.
    pub fn fit(&mut self, features: &Array2<f64>, target: &Array1<f64>) -> ForecastResult<()> {
        self.regressor
            .fit(features, target)
            .map_err(|source| ForecastError::ModelFit {
                model: self.name.clone(),
                source,
            })
    }

    /// Predict a single feature vector, tagging failures with the model name.
    pub fn predict_one(&self, features: &[f64]) -> ForecastResult<f64> {
        self.regressor
            .predict_one(features)
            .map_err(|source| ForecastError::ModelPredict {
                model: self.name.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_check_training_input() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(check_training_input(&x, &array![1.0, 2.0]).is_ok());
        assert_eq!(
            check_training_input(&x, &array![1.0]),
            Err(ModelError::DimensionMismatch { expected: 2, got: 1 })
        );
        assert_eq!(
            check_training_input(&Array2::zeros((0, 2)), &Array1::zeros(0)),
            Err(ModelError::EmptyTrainingSet)
        );
        assert!(matches!(
            check_training_input(&x, &array![1.0, f64::NAN]),
            Err(ModelError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_handle_tags_errors_with_name() {
        let handle = ModelHandle::new("Linear", Box::new(LinearRegression::default()));
        let err = handle.predict_one(&[1.0]).unwrap_err();
        match err {
            ForecastError::ModelPredict { model, source } => {
                assert_eq!(model, "Linear");
                assert_eq!(source, ModelError::NotFitted);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

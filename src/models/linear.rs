//! Linear regression by ordinary least squares.
//!
//! Solves the normal equations on centered data with a Cholesky
//! factorisation. Lag features of a smooth series are strongly collinear,
//! so a ridge term scaled to the Gram matrix's trace keeps the system
//! positive definite; it is raised until the factorisation succeeds.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{check_predict_input, check_training_input, ModelError, Regressor};

/// Relative ridge added to the Gram matrix diagonal.
const BASE_RIDGE: f64 = 1e-10;

/// Attempts (each multiplying the ridge by 100) before giving up.
const MAX_RIDGE_ATTEMPTS: usize = 8;

/// Linear regression configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    /// Whether to fit an intercept
    pub fit_intercept: bool,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            fit_intercept: true,
        }
    }
}

/// Linear Regression model using Ordinary Least Squares
#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    config: LinearConfig,
    /// Coefficients (weights) for each feature
    coefficients: Option<Array1<f64>>,
    /// Intercept (bias) term
    intercept: f64,
}

impl LinearRegression {
    pub fn new(config: LinearConfig) -> Self {
        Self {
            config,
            coefficients: None,
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Solve `(A + λI) x = b` with a Cholesky factorisation.
    fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
        let n = a.nrows();
        let mut l = Array2::<f64>::zeros((n, n));

        // A = L * L^T
        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l[[i, k]] * l[[j, k]];
                }

                if i == j {
                    let diag = a[[i, i]] - sum;
                    if diag <= 0.0 || !diag.is_finite() {
                        return Err(ModelError::SingularMatrix);
                    }
                    l[[i, j]] = diag.sqrt();
                } else {
                    l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
                }
            }
        }

        // L * z = b
        let mut z = Array1::<f64>::zeros(n);
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..i {
                sum += l[[i, j]] * z[j];
            }
            z[i] = (b[i] - sum) / l[[i, i]];
        }

        // L^T * x = z
        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            let mut sum = 0.0;
            for j in (i + 1)..n {
                sum += l[[j, i]] * x[j];
            }
            x[i] = (z[i] - sum) / l[[i, i]];
        }

        Ok(x)
    }

    fn solve_ridge(xtx: &Array2<f64>, xty: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
        let n = xtx.nrows();
        let scale = (xtx.diag().sum() / n.max(1) as f64).max(1.0);
        let mut ridge = BASE_RIDGE * scale;

        for _ in 0..MAX_RIDGE_ATTEMPTS {
            let mut regularised = xtx.clone();
            for i in 0..n {
                regularised[[i, i]] += ridge;
            }
            match Self::cholesky_solve(&regularised, xty) {
                Ok(beta) => return Ok(beta),
                Err(_) => ridge *= 100.0,
            }
        }

        Err(ModelError::SingularMatrix)
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, features: &Array2<f64>, target: &Array1<f64>) -> Result<(), ModelError> {
        check_training_input(features, target)?;

        let (x_mean, y_mean) = if self.config.fit_intercept {
            let x_mean = features
                .mean_axis(Axis(0))
                .ok_or(ModelError::EmptyTrainingSet)?;
            let y_mean = target.mean().ok_or(ModelError::EmptyTrainingSet)?;
            (x_mean, y_mean)
        } else {
            (Array1::zeros(features.ncols()), 0.0)
        };

        let x_centered = features - &x_mean;
        let y_centered = target - y_mean;

        let xt = x_centered.t();
        let xtx = xt.dot(&x_centered);
        let xty = xt.dot(&y_centered);

        let beta = Self::solve_ridge(&xtx, &xty)?;

        self.intercept = y_mean - x_mean.dot(&beta);
        self.coefficients = Some(beta);

        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let coefficients = self.coefficients.as_ref().ok_or(ModelError::NotFitted)?;
        check_predict_input(features, coefficients.len())?;
        Ok(features.dot(coefficients) + self.intercept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_exact_relationship() {
        // y = 2*x1 - 3*x2 + 5
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 5.0], [4.0, 3.0], [5.0, 8.0]];
        let y: Array1<f64> = x.rows().into_iter().map(|r| 2.0 * r[0] - 3.0 * r[1] + 5.0).collect();

        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-6);
        assert!((coef[1] + 3.0).abs() < 1e-6);
        assert!((model.intercept() - 5.0).abs() < 1e-6);

        let pred = model.predict_one(&[10.0, 10.0]).unwrap();
        assert!((pred - (-5.0)).abs() < 1e-5);
    }

    #[test]
    fn test_collinear_features_extrapolate_trend() {
        // Lags of a straight line are perfectly collinear
        let x: Array2<f64> = Array2::from_shape_fn((50, 3), |(i, j)| {
            let lag = [1.0, 2.0, 4.0][j];
            10.0 + 0.1 * (i as f64 + 10.0 - lag)
        });
        let y: Array1<f64> = (0..50).map(|i| 10.0 + 0.1 * (i as f64 + 10.0)).collect();

        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();

        let next = [10.0 + 0.1 * 59.0, 10.0 + 0.1 * 58.0, 10.0 + 0.1 * 56.0];
        let pred = model.predict_one(&next).unwrap();
        assert!((pred - 16.0).abs() < 1e-5, "pred = {pred}");
    }

    #[test]
    fn test_constant_series_predicts_constant() {
        let x = Array2::from_elem((30, 4), 25.0);
        let y = Array1::from_elem(30, 25.0);

        let mut model = LinearRegression::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict_one(&[25.0; 4]).unwrap(), 25.0);
    }

    #[test]
    fn test_not_fitted() {
        let model = LinearRegression::default();
        assert_eq!(model.predict_one(&[1.0]), Err(ModelError::NotFitted));
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let mut model = LinearRegression::default();
        model
            .fit(&array![[1.0, 2.0], [2.0, 3.0], [3.0, 5.0]], &array![1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(
            model.predict_one(&[1.0]),
            Err(ModelError::DimensionMismatch { expected: 2, got: 1 })
        );
    }

    #[test]
    fn test_refit_replaces_state() {
        let x = array![[1.0], [2.0], [3.0]];
        let mut model = LinearRegression::default();
        model.fit(&x, &array![2.0, 4.0, 6.0]).unwrap();
        model.fit(&x, &array![1.0, 1.0, 1.0]).unwrap();
        assert!((model.predict_one(&[10.0]).unwrap() - 1.0).abs() < 1e-9);
    }
}

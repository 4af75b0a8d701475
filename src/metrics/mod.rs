//! Forecast accuracy metrics.
//!
//! Provides per-model error calculations over backtest records:
//! - Mean absolute error, root mean squared error
//! - Mean signed error (bias), largest miss
//! - Rolling MAE by reporting window

pub mod errors;

pub use errors::{ErrorCalculator, ModelErrorStats, RollingError};

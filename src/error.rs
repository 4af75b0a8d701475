//! Engine error taxonomy.
//!
//! Every precondition violation is surfaced to the caller. Model failures
//! carry the model name so a caller can decide whether a partial ensemble
//! is acceptable.

use thiserror::Error;

use crate::models::ModelError;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Insufficient history: {rows} rows available, {required} required")]
    InsufficientHistory { rows: usize, required: usize },

    #[error("Invalid horizon: {0} (must be at least 1)")]
    InvalidHorizon(usize),

    #[error("Ensemble has no contributing models")]
    EmptyEnsemble,

    #[error("Invalid lag configuration: {0}")]
    InvalidLagConfig(String),

    #[error("Forecast for {model} has {got} steps, expected {expected}")]
    MismatchedHorizons {
        model: String,
        expected: usize,
        got: usize,
    },

    #[error("Model {model} failed to fit: {source}")]
    ModelFit {
        model: String,
        #[source]
        source: ModelError,
    },

    #[error("Model {model} failed to predict: {source}")]
    ModelPredict {
        model: String,
        #[source]
        source: ModelError,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type ForecastResult<T> = Result<T, ForecastError>;

//! Recursive multi-step forecasting.
//!
//! True future lags are unobservable, so each step's prediction becomes the
//! newest lag input for the next step. Values move between lag slots by
//! list position: with lags `[1, 5, 10, 20]` the prediction enters slot 0,
//! the old slot 0 moves to slot 1, and so on. This does not advance each lag
//! by its calendar offset when the lag set is non-contiguous.

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ForecastError, ForecastResult};
use crate::features::{LagTable, LaggedRow};
use crate::models::{ModelHandle, ModelRegistry};

/// Predicted path of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    /// Model that produced the path
    pub model_name: String,

    /// Calendar date of each step (day after the last observation onwards)
    pub dates: Vec<NaiveDate>,

    /// Predicted values; index 0 is one period after the last observation
    pub values: Vec<f64>,
}

impl ForecastSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// A model that could not contribute to a forecast run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFailure {
    pub model: String,
    pub message: String,
}

/// Forecasts from every registered model, fitted on the full table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRun {
    /// Successful forecasts, in registration order
    pub forecasts: Vec<ForecastSeries>,

    /// Models whose fit or predict failed
    pub failures: Vec<ModelFailure>,

    /// Number of models the registry asked for
    pub expected_models: usize,
}

impl ForecastRun {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.forecasts.len() == self.expected_models
    }

    pub fn get(&self, model_name: &str) -> Option<&ForecastSeries> {
        self.forecasts.iter().find(|f| f.model_name == model_name)
    }
}

/// Recursive forecaster for a fixed horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursiveForecaster {
    steps: usize,
}

impl RecursiveForecaster {
    /// Create a forecaster; `steps` must be at least 1.
    pub fn new(steps: usize) -> ForecastResult<Self> {
        if steps < 1 {
            return Err(ForecastError::InvalidHorizon(steps));
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Project `steps` values from a fitted model starting at `last_row`.
    pub fn forecast(&self, model: &ModelHandle, last_row: &LaggedRow) -> ForecastResult<ForecastSeries> {
        let mut lags = last_row.lags.clone();
        let mut values = Vec::with_capacity(self.steps);

        for _ in 0..self.steps {
            let pred = model.predict_one(&lags)?;
            values.push(pred);
            shift_lags(&mut lags, pred);
        }

        Ok(ForecastSeries {
            model_name: model.name().to_string(),
            dates: forecast_dates(last_row.date, self.steps),
            values,
        })
    }

    /// Fit fresh models from `registry` on the whole table and forecast
    /// each one from the table's last row.
    ///
    /// A model that fails is recorded in `failures`; the run only errors
    /// when the table is empty.
    pub fn run(&self, registry: &ModelRegistry, table: &LagTable) -> ForecastResult<ForecastRun> {
        let last_row = table.last_row().ok_or(ForecastError::InsufficientHistory {
            rows: 0,
            required: 1,
        })?;

        let features = table.feature_matrix(table.len());
        let targets = table.targets(table.len());

        info!(
            "Forecasting {} steps with {} models on {} rows",
            self.steps,
            registry.len(),
            table.len()
        );

        // Models are independent; results keep registration order
        let outcomes: Vec<(String, ForecastResult<ForecastSeries>)> = registry
            .build()
            .into_par_iter()
            .map(|mut handle| {
                let name = handle.name().to_string();
                let result = handle
                    .fit(&features, &targets)
                    .and_then(|_| self.forecast(&handle, last_row));
                (name, result)
            })
            .collect();

        let mut forecasts = Vec::new();
        let mut failures = Vec::new();
        for (model, outcome) in outcomes {
            match outcome {
                Ok(series) => forecasts.push(series),
                Err(e) => {
                    warn!("Model {} excluded from forecast: {}", model, e);
                    failures.push(ModelFailure {
                        model,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(ForecastRun {
            forecasts,
            failures,
            expected_models: registry.len(),
        })
    }
}

/// Positional lag shift: slot `i` takes slot `i - 1`, slot 0 takes `newest`.
pub fn shift_lags(lags: &mut [f64], newest: f64) {
    if lags.is_empty() {
        return;
    }
    for i in (1..lags.len()).rev() {
        lags[i] = lags[i - 1];
    }
    lags[0] = newest;
}

/// Daily dates following `last_date`.
pub fn forecast_dates(last_date: NaiveDate, steps: usize) -> Vec<NaiveDate> {
    (1..=steps)
        .map(|i| last_date + Duration::days(i as i64))
        .collect()
}

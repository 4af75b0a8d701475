//! Lag feature construction.
//!
//! Turns a date-ordered rate series into a supervised-learning table where
//! each row's features are the rates observed `k` periods earlier, one
//! column per configured lag. Rows without a full set of lags are dropped,
//! so the table is `max_lag` rows shorter than the series.

use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::RateSeries;
use crate::error::{ForecastError, ForecastResult};

/// Ordered set of lag offsets (periods back from the row's date).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct LagConfig(Vec<usize>);

impl Default for LagConfig {
    fn default() -> Self {
        Self(vec![1, 5, 10, 20])
    }
}

impl LagConfig {
    /// Create a lag configuration.
    ///
    /// Lags must be non-empty, positive and strictly increasing. The
    /// recursive forecaster shifts values between slots by position, so the
    /// order here is the slot order.
    pub fn new(lags: Vec<usize>) -> ForecastResult<Self> {
        if lags.is_empty() {
            return Err(ForecastError::InvalidLagConfig(
                "at least one lag is required".to_string(),
            ));
        }
        if lags.contains(&0) {
            return Err(ForecastError::InvalidLagConfig(
                "lags must be positive".to_string(),
            ));
        }
        if lags.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ForecastError::InvalidLagConfig(format!(
                "lags must be strictly increasing, got {:?}",
                lags
            )));
        }
        Ok(Self(lags))
    }

    pub fn lags(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Largest configured lag (rows lost at the head of the series).
    pub fn max_lag(&self) -> usize {
        self.0.iter().copied().max().unwrap_or(0)
    }

    /// Feature column names in slot order (`lag_1`, `lag_5`, ...).
    pub fn feature_names(&self) -> Vec<String> {
        self.0.iter().map(|l| format!("lag_{}", l)).collect()
    }
}

impl TryFrom<Vec<usize>> for LagConfig {
    type Error = ForecastError;

    fn try_from(lags: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(lags)
    }
}

impl From<LagConfig> for Vec<usize> {
    fn from(config: LagConfig) -> Self {
        config.0
    }
}

/// One supervised-learning row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaggedRow {
    /// Date of the target observation
    pub date: NaiveDate,

    /// Target rate on that date
    pub target: f64,

    /// Lagged rates, one per configured lag, in slot order
    pub lags: Vec<f64>,
}

impl LaggedRow {
    pub fn features(&self) -> &[f64] {
        &self.lags
    }
}

/// Lagged feature table derived from a rate series.
///
/// The source series is retained so the table can be regenerated for a
/// different lag configuration without going back to the data source.
#[derive(Debug, Clone, PartialEq)]
pub struct LagTable {
    config: LagConfig,
    rows: Vec<LaggedRow>,
    series: RateSeries,
}

impl LagTable {
    pub fn config(&self) -> &LagConfig {
        &self.config
    }

    pub fn rows(&self) -> &[LaggedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The raw series the table was built from.
    pub fn series(&self) -> &RateSeries {
        &self.series
    }

    /// Most recent row (starting point for recursive forecasts).
    pub fn last_row(&self) -> Option<&LaggedRow> {
        self.rows.last()
    }

    /// Feature matrix for rows `[0, end)`.
    pub fn feature_matrix(&self, end: usize) -> Array2<f64> {
        let end = end.min(self.rows.len());
        let n_features = self.config.len();
        let mut matrix = Array2::<f64>::zeros((end, n_features));
        for (i, row) in self.rows[..end].iter().enumerate() {
            for (j, &value) in row.lags.iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }
        matrix
    }

    /// Target vector for rows `[0, end)`.
    pub fn targets(&self, end: usize) -> Array1<f64> {
        let end = end.min(self.rows.len());
        self.rows[..end].iter().map(|r| r.target).collect()
    }

    /// Table with lag columns matching `config`.
    ///
    /// Returns a copy when the columns already match; otherwise rebuilds
    /// from the retained series.
    pub fn with_lags(&self, config: &LagConfig) -> ForecastResult<LagTable> {
        if &self.config == config {
            return Ok(self.clone());
        }
        debug!(
            "Regenerating lag columns {:?} (table has {:?})",
            config.lags(),
            self.config.lags()
        );
        LagFeatureBuilder::new(config.clone()).build(&self.series)
    }
}

/// Builds `LagTable`s from rate series.
#[derive(Debug, Clone, Default)]
pub struct LagFeatureBuilder {
    config: LagConfig,
}

impl LagFeatureBuilder {
    pub fn new(config: LagConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LagConfig {
        &self.config
    }

    /// Build the lagged table.
    ///
    /// Fails with `InsufficientHistory` when the series is not longer than
    /// the largest lag.
    pub fn build(&self, series: &RateSeries) -> ForecastResult<LagTable> {
        let max_lag = self.config.max_lag();
        let observations = series.observations();

        if observations.len() <= max_lag {
            return Err(ForecastError::InsufficientHistory {
                rows: observations.len(),
                required: max_lag + 1,
            });
        }

        let rates = series.rates_f64();
        let rows: Vec<LaggedRow> = (max_lag..observations.len())
            .map(|i| LaggedRow {
                date: observations[i].date,
                target: rates[i],
                lags: self.config.lags().iter().map(|&k| rates[i - k]).collect(),
            })
            .collect();

        Ok(LagTable {
            config: self.config.clone(),
            rows,
            series: series.clone(),
        })
    }
}

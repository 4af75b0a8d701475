//! Consensus and range across model forecasts.
//!
//! All models are read at one horizon index (the end-of-week day by
//! default). The summary is a pure function of the forecasts and the
//! reference rate.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::recursive::{ForecastRun, ForecastSeries};
use crate::error::{ForecastError, ForecastResult};

/// Default 1-based summary day (end of the first week).
pub const DEFAULT_SUMMARY_DAY: usize = 7;

/// Direction of the quoted currency implied by a rate move.
///
/// Rates are units of local currency per unit of foreign currency, so a
/// rising rate means the local currency weakens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    Weakening,
    Strengthening,
    Stable,
}

impl Outlook {
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Outlook::Weakening
        } else if change < 0.0 {
            Outlook::Strengthening
        } else {
            Outlook::Stable
        }
    }
}

impl fmt::Display for Outlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outlook::Weakening => "weaken",
            Outlook::Strengthening => "strengthen",
            Outlook::Stable => "remain stable",
        };
        write!(f, "{}", label)
    }
}

/// Cross-model summary at one horizon index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSummary {
    /// 0-based index into each forecast
    pub horizon_index: usize,

    /// Calendar date of that index, when forecasts carry dates
    pub date: Option<NaiveDate>,

    /// Value of each model at the index
    pub per_model: BTreeMap<String, f64>,

    /// Mean across models
    pub consensus: f64,

    /// Maximum across models
    pub best_case: f64,

    /// Minimum across models
    pub worst_case: f64,

    /// Rate the change is measured against (usually the latest observation)
    pub reference_rate: f64,

    /// `consensus - reference_rate`
    pub change: f64,

    /// `change / reference_rate * 100`
    pub pct_change: f64,

    pub outlook: Outlook,

    /// Models the caller expected to contribute
    pub expected_models: usize,
}

impl EnsembleSummary {
    pub fn contributing_models(&self) -> usize {
        self.per_model.len()
    }

    /// Fewer models contributed than were expected.
    pub fn is_partial(&self) -> bool {
        self.per_model.len() < self.expected_models
    }

    /// Width of the best/worst range.
    pub fn spread(&self) -> f64 {
        self.best_case - self.worst_case
    }
}

/// Aggregates per-model forecasts into an `EnsembleSummary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsembleAggregator {
    summary_day: usize,
}

impl Default for EnsembleAggregator {
    fn default() -> Self {
        Self {
            summary_day: DEFAULT_SUMMARY_DAY,
        }
    }
}

impl EnsembleAggregator {
    /// Aggregate at 1-based `summary_day`, clamped to the forecast length.
    pub fn new(summary_day: usize) -> ForecastResult<Self> {
        if summary_day == 0 {
            return Err(ForecastError::InvalidParameter(
                "summary day is 1-based and must be at least 1".to_string(),
            ));
        }
        Ok(Self { summary_day })
    }

    pub fn summary_day(&self) -> usize {
        self.summary_day
    }

    /// 0-based index read from forecasts of `horizon` steps.
    pub fn horizon_index(&self, horizon: usize) -> usize {
        self.summary_day.min(horizon).saturating_sub(1)
    }

    /// Summarise `forecasts` against `reference_rate`.
    ///
    /// `expected_models` is the size of the ensemble the caller asked for;
    /// a summary over fewer forecasts is flagged partial.
    pub fn aggregate(
        &self,
        forecasts: &[ForecastSeries],
        reference_rate: f64,
        expected_models: usize,
    ) -> ForecastResult<EnsembleSummary> {
        let first = forecasts.first().ok_or(ForecastError::EmptyEnsemble)?;
        let horizon = first.len();
        if horizon == 0 {
            return Err(ForecastError::InvalidHorizon(0));
        }
        if !(reference_rate.is_finite() && reference_rate != 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "reference rate must be finite and non-zero, got {}",
                reference_rate
            )));
        }

        let index = self.horizon_index(horizon);
        let mut per_model = BTreeMap::new();

        for series in forecasts {
            if series.len() != horizon {
                return Err(ForecastError::MismatchedHorizons {
                    model: series.model_name.clone(),
                    expected: horizon,
                    got: series.len(),
                });
            }
            let value = series.values[index];
            if !value.is_finite() {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} forecast is not finite at index {}",
                    series.model_name, index
                )));
            }
            if per_model.insert(series.model_name.clone(), value).is_some() {
                return Err(ForecastError::InvalidParameter(format!(
                    "duplicate model in ensemble: {}",
                    series.model_name
                )));
            }
        }

        let values: Vec<f64> = per_model.values().copied().collect();
        let consensus = values.iter().sum::<f64>() / values.len() as f64;
        let best_case = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let worst_case = values.iter().copied().fold(f64::INFINITY, f64::min);
        // Keep the range ordered even when the mean rounds past an extreme
        let consensus = consensus.clamp(worst_case, best_case);

        let change = consensus - reference_rate;
        let pct_change = change / reference_rate * 100.0;

        if per_model.len() < expected_models {
            warn!(
                "Partial ensemble: {} of {} models contributed",
                per_model.len(),
                expected_models
            );
        }

        Ok(EnsembleSummary {
            horizon_index: index,
            date: first.dates.get(index).copied(),
            per_model,
            consensus,
            best_case,
            worst_case,
            reference_rate,
            change,
            pct_change,
            outlook: Outlook::from_change(change),
            expected_models: expected_models.max(forecasts.len()),
        })
    }

    /// Summarise a forecast run; failed models make the summary partial.
    pub fn aggregate_run(&self, run: &ForecastRun, reference_rate: f64) -> ForecastResult<EnsembleSummary> {
        self.aggregate(&run.forecasts, reference_rate, run.expected_models)
    }
}

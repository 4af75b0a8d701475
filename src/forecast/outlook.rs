//! Week-over-week view of the ensemble.
//!
//! Compares this week's consensus with earlier weekly consensus values,
//! turns a summary into per-model weekly prediction records, and scores
//! those records once the end-of-week rate is known.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ensemble::{EnsembleSummary, Outlook};
use crate::data::RateSeries;
use crate::error::{ForecastError, ForecastResult};

/// Default number of past weeks in the trend comparison.
pub const DEFAULT_LOOKBACK_WEEKS: usize = 4;

/// Consensus published for one past week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeeklyConsensus {
    pub week_start: NaiveDate,
    pub consensus: f64,
}

/// Movement of the current consensus against earlier weeks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyComparison {
    pub consensus: f64,

    /// Previous week's consensus, or the reference rate with no history
    pub previous: f64,

    /// `consensus - previous`
    pub change_vs_previous: f64,
    pub pct_vs_previous: f64,

    /// Oldest consensus within the lookback window, if any
    pub trend_base: Option<f64>,
    pub trend_change: Option<f64>,
    pub trend_pct: Option<f64>,

    /// Past weeks considered for the trend
    pub trend_weeks: usize,

    pub outlook: Outlook,
}

/// Compare `summary` with prior weekly consensus values.
///
/// `history` may be unordered; only entries before the current week are
/// used when `current_week` is given.
pub fn compare_weeks(
    summary: &EnsembleSummary,
    history: &[WeeklyConsensus],
    current_week: Option<NaiveDate>,
    lookback_weeks: usize,
) -> WeeklyComparison {
    let mut past: Vec<WeeklyConsensus> = history
        .iter()
        .filter(|w| current_week.map_or(true, |current| w.week_start < current))
        .copied()
        .collect();
    past.sort_by_key(|w| w.week_start);

    let consensus = summary.consensus;
    let previous = past
        .last()
        .map_or(summary.reference_rate, |w| w.consensus);
    let change_vs_previous = consensus - previous;

    let window = &past[past.len().saturating_sub(lookback_weeks)..];
    let trend_base = window.first().map(|w| w.consensus);
    let trend_change = trend_base.map(|base| consensus - base);

    WeeklyComparison {
        consensus,
        previous,
        change_vs_previous,
        pct_vs_previous: percent(change_vs_previous, previous),
        trend_base,
        trend_change,
        trend_pct: trend_base.zip(trend_change).map(|(base, c)| percent(c, base)),
        trend_weeks: window.len(),
        outlook: summary.outlook,
    }
}

fn percent(change: f64, base: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        change / base * 100.0
    }
}

/// One model's end-of-week prediction for a week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub model: String,
    pub predicted_rate: f64,
    pub consensus: f64,
    pub best_case: f64,
    pub worst_case: f64,
}

/// Flatten a summary into one record per model for the week starting
/// `week_start`.
pub fn weekly_records(summary: &EnsembleSummary, week_start: NaiveDate) -> Vec<PredictionRecord> {
    let week_end = week_start + Duration::days(6);
    summary
        .per_model
        .iter()
        .map(|(model, &predicted_rate)| PredictionRecord {
            week_start,
            week_end,
            model: model.clone(),
            predicted_rate,
            consensus: summary.consensus,
            best_case: summary.best_case,
            worst_case: summary.worst_case,
        })
        .collect()
}

/// Merge a week's records into the saved history.
///
/// Saved rows for any week present in `records` are replaced, so saving the
/// same week again keeps one record per model.
pub fn replace_week(history: Vec<PredictionRecord>, records: Vec<PredictionRecord>) -> Vec<PredictionRecord> {
    let mut merged: Vec<PredictionRecord> = history
        .into_iter()
        .filter(|old| !records.iter().any(|new| new.week_start == old.week_start))
        .collect();
    merged.extend(records);
    merged
}

/// A prediction scored against the realised rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewedPrediction {
    pub model: String,
    pub predicted_rate: f64,

    /// `predicted - actual`; `None` when the actual is not yet known
    pub error: Option<f64>,
}

/// Review of the latest recorded week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekReview {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub actual_rate: Option<f64>,
    pub consensus: f64,
    pub consensus_error: Option<f64>,
    pub predictions: Vec<ReviewedPrediction>,
}

/// Score the most recent week in `records` against the observed rate on
/// its `week_end` date.
pub fn review_week(records: &[PredictionRecord], actuals: &RateSeries) -> ForecastResult<WeekReview> {
    let week_start = records
        .iter()
        .map(|r| r.week_start)
        .max()
        .ok_or_else(|| ForecastError::InvalidParameter("no prediction records".to_string()))?;
    let week_end = week_start + Duration::days(6);

    let actual_rate = actuals
        .observations()
        .iter()
        .find(|o| o.date == week_end)
        .map(|o| o.rate_f64());

    let week: Vec<&PredictionRecord> = records.iter().filter(|r| r.week_start == week_start).collect();
    let consensus = week.first().map_or(f64::NAN, |r| r.consensus);

    let predictions = week
        .iter()
        .map(|r| ReviewedPrediction {
            model: r.model.clone(),
            predicted_rate: r.predicted_rate,
            error: actual_rate.map(|actual| r.predicted_rate - actual),
        })
        .collect();

    Ok(WeekReview {
        week_start,
        week_end,
        actual_rate,
        consensus,
        consensus_error: actual_rate.map(|actual| consensus - actual),
        predictions,
    })
}

//! Forecasting module.
//!
//! - Recursive multi-step forecasts per model
//! - Consensus/best/worst aggregation across models
//! - Week-over-week comparison and weekly prediction review

pub mod ensemble;
pub mod outlook;
pub mod recursive;

pub use ensemble::{EnsembleAggregator, EnsembleSummary, Outlook, DEFAULT_SUMMARY_DAY};
pub use outlook::{
    compare_weeks, replace_week, review_week, weekly_records, PredictionRecord, ReviewedPrediction,
    WeekReview, WeeklyComparison, WeeklyConsensus, DEFAULT_LOOKBACK_WEEKS,
};
pub use recursive::{
    forecast_dates, shift_lags, ForecastRun, ForecastSeries, ModelFailure, RecursiveForecaster,
};

//! Forecast error statistics.
//!
//! Aggregates backtest records per model: MAE, RMSE, mean signed error
//! (bias) and worst miss, plus rolling MAE over a fixed window of steps.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::walkforward::{BacktestRecord, BacktestResult};

/// Error statistics for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelErrorStats {
    pub model: String,
    pub count: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Mean of `predicted - actual`; positive means over-forecasting
    pub bias: f64,
    pub max_abs_error: f64,
}

/// MAE over one window of consecutive steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingError {
    pub model: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub mae: f64,
}

/// Error statistics calculator.
pub struct ErrorCalculator;

impl ErrorCalculator {
    /// Statistics per model, in order of first appearance.
    pub fn by_model(records: &[BacktestRecord]) -> Vec<ModelErrorStats> {
        let mut models: Vec<&str> = Vec::new();
        for record in records {
            if !models.contains(&record.model.as_str()) {
                models.push(&record.model);
            }
        }

        models
            .into_iter()
            .filter_map(|model| {
                let errors: Vec<f64> = records
                    .iter()
                    .filter(|r| r.model == model)
                    .map(|r| r.error)
                    .collect();
                Self::stats(model, &errors)
            })
            .collect()
    }

    /// Statistics for a finished backtest, in registration order.
    pub fn for_result(result: &BacktestResult) -> Vec<ModelErrorStats> {
        result
            .models
            .iter()
            .filter_map(|model| {
                let errors: Vec<f64> = result.records_for(model).map(|r| r.error).collect();
                Self::stats(model, &errors)
            })
            .collect()
    }

    /// Models ordered by ascending MAE (best first).
    pub fn ranking(records: &[BacktestRecord]) -> Vec<ModelErrorStats> {
        let mut stats = Self::by_model(records);
        stats.sort_by(|a, b| a.mae.total_cmp(&b.mae));
        stats
    }

    /// Non-overlapping windows of `window` steps for one model; a trailing
    /// partial window is reported too.
    pub fn rolling_mae(records: &[BacktestRecord], model: &str, window: usize) -> Vec<RollingError> {
        let rows: Vec<&BacktestRecord> = records.iter().filter(|r| r.model == model).collect();
        if window == 0 {
            return Vec::new();
        }

        rows.chunks(window)
            .filter_map(|chunk| {
                let first = chunk.first()?;
                let last = chunk.last()?;
                let mae = chunk.iter().map(|r| r.abs_error).sum::<f64>() / chunk.len() as f64;
                Some(RollingError {
                    model: model.to_string(),
                    start_date: first.date,
                    end_date: last.date,
                    mae,
                })
            })
            .collect()
    }

    fn stats(model: &str, errors: &[f64]) -> Option<ModelErrorStats> {
        if errors.is_empty() {
            return None;
        }
        let n = errors.len() as f64;
        Some(ModelErrorStats {
            model: model.to_string(),
            count: errors.len(),
            mae: errors.iter().map(|e| e.abs()).sum::<f64>() / n,
            rmse: (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt(),
            bias: errors.iter().sum::<f64>() / n,
            max_abs_error: errors.iter().fold(0.0_f64, |acc, e| acc.max(e.abs())),
        })
    }

    /// Plain-text table of per-model statistics.
    pub fn summary(stats: &[ModelErrorStats]) -> String {
        let mut out = format!(
            "{:<20} {:>6} {:>10} {:>10} {:>10} {:>10}\n",
            "Model", "Steps", "MAE", "RMSE", "Bias", "Max |e|"
        );
        for s in stats {
            out.push_str(&format!(
                "{:<20} {:>6} {:>10.4} {:>10.4} {:>+10.4} {:>10.4}\n",
                s.model, s.count, s.mae, s.rmse, s.bias, s.max_abs_error
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day: u32, model: &str, actual: f64, predicted: f64) -> BacktestRecord {
        BacktestRecord::new(
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            model,
            actual,
            predicted,
        )
    }

    fn sample() -> Vec<BacktestRecord> {
        vec![
            record(1, "A", 10.0, 11.0),
            record(1, "B", 10.0, 10.5),
            record(2, "A", 10.0, 7.0),
            record(2, "B", 10.0, 9.5),
        ]
    }

    #[test]
    fn test_by_model() {
        let stats = ErrorCalculator::by_model(&sample());
        assert_eq!(stats.len(), 2);

        let a = &stats[0];
        assert_eq!(a.model, "A");
        assert_eq!(a.count, 2);
        assert_eq!(a.mae, 2.0);
        assert_eq!(a.bias, -1.0);
        assert_eq!(a.max_abs_error, 3.0);
        assert!((a.rmse - 5.0_f64.sqrt()).abs() < 1e-12);

        assert_eq!(stats[1].mae, 0.5);
        assert_eq!(stats[1].bias, 0.0);
    }

    #[test]
    fn test_ranking_best_first() {
        let ranking = ErrorCalculator::ranking(&sample());
        assert_eq!(ranking[0].model, "B");
        assert_eq!(ranking[1].model, "A");
    }

    #[test]
    fn test_rolling_mae() {
        let records: Vec<BacktestRecord> = (1..=5)
            .map(|d| record(d, "A", 10.0, 10.0 + d as f64))
            .collect();
        let rolling = ErrorCalculator::rolling_mae(&records, "A", 2);

        assert_eq!(rolling.len(), 3);
        assert_eq!(rolling[0].mae, 1.5);
        assert_eq!(rolling[1].mae, 3.5);
        assert_eq!(rolling[2].mae, 5.0);
        assert_eq!(rolling[2].start_date, rolling[2].end_date);
        assert!(ErrorCalculator::rolling_mae(&records, "A", 0).is_empty());
    }

    #[test]
    fn test_empty_records() {
        assert!(ErrorCalculator::by_model(&[]).is_empty());
        assert!(ErrorCalculator::summary(&[]).starts_with("Model"));
    }
}

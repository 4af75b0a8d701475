//! Walk-forward backtesting.
//!
//! At each evaluation index `i` every model is trained from scratch on
//! rows `[0, i)` and predicts row `i` once. Predictions never feed back into
//! later features, and nothing at or after `i` is visible to training.
//!
//! Steps only read the immutable table, so they run in parallel with rayon.
//! Records are always emitted in step order, then registration order.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use ndarray::{s, Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ForecastError, ForecastResult};
use crate::features::{LagConfig, LagTable};
use crate::models::ModelRegistry;

/// Progress callback: `(completed_steps, total_steps)`.
///
/// Each completed step is reported exactly once. When steps run on the
/// rayon pool, calls can interleave, so a later call may carry a smaller
/// count than an earlier one; treat each call as "one more step finished".
pub type ProgressObserver<'a> = &'a (dyn Fn(usize, usize) + Sync);

/// Walk-forward configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Reporting window for rolling error summaries (does not bound the loop)
    pub window: usize,
    /// Rows in the first training prefix
    pub start_size: usize,
    /// Upper bound on evaluation steps
    pub max_steps: usize,
    /// Evaluate steps on the rayon pool
    pub parallel: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            window: 20,
            start_size: 250,
            max_steps: 300,
            parallel: true,
        }
    }
}

impl BacktestConfig {
    /// Evaluation indices for a table of `rows` rows.
    pub fn evaluation_range(&self, rows: usize) -> Range<usize> {
        let end = rows.min(self.start_size.saturating_add(self.max_steps));
        self.start_size..end.max(self.start_size)
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if self.start_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "start_size must be at least 1".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if self.window == 0 {
            return Err(ForecastError::InvalidParameter(
                "window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One model's one-step prediction at one evaluation index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub date: NaiveDate,
    pub model: String,
    pub actual: f64,
    pub predicted: f64,
    /// `predicted - actual`
    pub error: f64,
    pub abs_error: f64,
}

impl BacktestRecord {
    pub fn new(date: NaiveDate, model: impl Into<String>, actual: f64, predicted: f64) -> Self {
        let error = predicted - actual;
        Self {
            date,
            model: model.into(),
            actual,
            predicted,
            error,
            abs_error: error.abs(),
        }
    }
}

/// Output of a walk-forward run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config: BacktestConfig,

    /// First evaluated table index
    pub first_index: usize,

    /// One past the last evaluated table index
    pub end_index: usize,

    /// Model names in registration order
    pub models: Vec<String>,

    pub records: Vec<BacktestRecord>,
}

impl BacktestResult {
    pub fn steps(&self) -> usize {
        self.end_index - self.first_index
    }

    pub fn records_for<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a BacktestRecord> + 'a {
        self.records.iter().filter(move |r| r.model == model)
    }
}

/// Walk-forward backtester.
#[derive(Debug, Clone, Default)]
pub struct WalkForwardBacktester {
    config: BacktestConfig,
    lags: LagConfig,
}

impl WalkForwardBacktester {
    /// `lags` are the columns the models are trained on; a table built with
    /// different lags is regenerated from its series.
    pub fn new(config: BacktestConfig, lags: LagConfig) -> Self {
        Self { config, lags }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn lags(&self) -> &LagConfig {
        &self.lags
    }

    pub fn run(&self, table: &LagTable, registry: &ModelRegistry) -> ForecastResult<BacktestResult> {
        self.run_with_progress(table, registry, None)
    }

    /// Run the backtest, reporting completed steps to `progress`.
    pub fn run_with_progress(
        &self,
        table: &LagTable,
        registry: &ModelRegistry,
        progress: Option<ProgressObserver<'_>>,
    ) -> ForecastResult<BacktestResult> {
        self.config.validate()?;

        let regenerated;
        let table = if table.config() == &self.lags {
            table
        } else {
            warn!(
                "Lag columns {:?} missing from table (has {:?}); regenerating",
                self.lags.lags(),
                table.config().lags()
            );
            regenerated = table.with_lags(&self.lags)?;
            &regenerated
        };

        let range = self.config.evaluation_range(table.len());
        if range.is_empty() {
            return Err(ForecastError::InsufficientHistory {
                rows: table.len(),
                required: self.config.start_size + 1,
            });
        }

        let total = range.len();
        info!(
            "Walk-forward backtest: {} steps x {} models (rows {}..{} of {})",
            total,
            registry.len(),
            range.start,
            range.end,
            table.len()
        );

        let features = table.feature_matrix(range.end);
        let targets = table.targets(range.end);
        let completed = AtomicUsize::new(0);

        let evaluate = |i: usize| -> ForecastResult<Vec<BacktestRecord>> {
            let records = evaluate_step(table, registry, &features, &targets, i)?;

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(observer) = progress {
                observer(done, total);
            }
            if done % (total / 10).max(1) == 0 || done == total {
                let pct = done as f64 / total as f64 * 100.0;
                info!("  Backtest: {:.0}% ({}/{} steps)", pct, done, total);
            }
            Ok(records)
        };

        let per_step: Vec<Vec<BacktestRecord>> = if self.config.parallel {
            range.clone().into_par_iter().map(evaluate).collect::<ForecastResult<_>>()?
        } else {
            range.clone().map(evaluate).collect::<ForecastResult<_>>()?
        };

        let records: Vec<BacktestRecord> = per_step.into_iter().flatten().collect();
        info!("Backtest complete: {} records", records.len());

        Ok(BacktestResult {
            config: self.config.clone(),
            first_index: range.start,
            end_index: range.end,
            models: registry.names().into_iter().map(String::from).collect(),
            records,
        })
    }
}

/// Train fresh models on rows `[0, i)` and score their prediction of row `i`.
fn evaluate_step(
    table: &LagTable,
    registry: &ModelRegistry,
    features: &Array2<f64>,
    targets: &Array1<f64>,
    i: usize,
) -> ForecastResult<Vec<BacktestRecord>> {
    let train_x = features.slice(s![..i, ..]).to_owned();
    let train_y = targets.slice(s![..i]).to_owned();
    let row = &table.rows()[i];

    let mut records = Vec::with_capacity(registry.len());
    for mut handle in registry.build() {
        handle.fit(&train_x, &train_y)?;
        let predicted = handle.predict_one(row.features())?;
        records.push(BacktestRecord::new(row.date, handle.name(), row.target, predicted));
    }
    debug!("Evaluated step {} ({})", i, row.date);
    Ok(records)
}

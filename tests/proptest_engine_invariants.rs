//! Property-based invariant tests for the forecasting engine.
//!
//! 1. Lag table length is `L - max(lags)`, or construction fails
//! 2. Recursive forecasts have exactly the requested number of steps
//! 3. Backtest record count is `models x evaluated steps`
//! 4. Ensemble summaries are ordered: worst <= consensus <= best

use chrono::{Duration, NaiveDate};
use ndarray::{Array1, Array2};
use proptest::prelude::*;
use rust_decimal::Decimal;

use fx_forecast::models::{
    LinearConfig, LinearRegression, ModelHandle, ModelSpec, NamedModelSpec, TreeConfig,
};
use fx_forecast::{
    BacktestConfig, EnsembleAggregator, ForecastError, ForecastSeries, LagConfig,
    LagFeatureBuilder, LaggedRow, ModelRegistry, RateObservation, RateSeries,
    RecursiveForecaster, WalkForwardBacktester,
};

// ── Strategies ──────────────────────────────────────────────────────────

/// Strictly increasing positive lag sets.
fn lag_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::btree_set(1usize..30, 1..5).prop_map(|set| set.into_iter().collect())
}

fn series(rates: &[i64]) -> RateSeries {
    let start = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
    RateSeries::new(
        rates
            .iter()
            .enumerate()
            .map(|(i, &r)| RateObservation::new(start + Duration::days(i as i64), Decimal::new(r, 2)))
            .collect(),
    )
    .unwrap()
}

fn registry() -> ModelRegistry {
    ModelRegistry::new(vec![
        NamedModelSpec::new("Linear", ModelSpec::LinearRegression(LinearConfig::default())),
        NamedModelSpec::new(
            "Tree",
            ModelSpec::DecisionTree(TreeConfig {
                max_depth: Some(4),
                ..Default::default()
            }),
        ),
    ])
    .unwrap()
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn lag_table_length(lags in lag_strategy(), rates in prop::collection::vec(1000i64..3000, 0..80)) {
        let config = LagConfig::new(lags).unwrap();
        let max_lag = config.max_lag();
        let result = LagFeatureBuilder::new(config).build(&series(&rates));

        if rates.len() > max_lag {
            let table = result.unwrap();
            prop_assert_eq!(table.len(), rates.len() - max_lag);
        } else {
            let is_insufficient = matches!(result, Err(ForecastError::InsufficientHistory { .. }));
            prop_assert!(is_insufficient);
        }
    }

    #[test]
    fn forecast_length_matches_steps(steps in 1usize..=60, start in 1.0f64..100.0) {
        let x = Array2::from_shape_fn((12, 2), |(i, j)| start + i as f64 + j as f64);
        let y: Array1<f64> = (0..12).map(|i| start + i as f64 * 0.5).collect();
        let mut model = ModelHandle::new("Linear", Box::new(LinearRegression::default()));
        model.fit(&x, &y).unwrap();

        let row = LaggedRow {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            target: start,
            lags: vec![start + 11.0, start + 12.0],
        };
        let series = RecursiveForecaster::new(steps).unwrap().forecast(&model, &row).unwrap();
        prop_assert_eq!(series.len(), steps);
        prop_assert_eq!(series.dates.len(), steps);
    }

    #[test]
    fn ensemble_is_ordered(values in prop::collection::vec(prop::collection::vec(-1e6f64..1e6, 7), 1..8)) {
        let forecasts: Vec<ForecastSeries> = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| ForecastSeries {
                model_name: format!("model_{}", i),
                dates: Vec::new(),
                values: v,
            })
            .collect();

        let summary = EnsembleAggregator::default()
            .aggregate(&forecasts, 1.0, forecasts.len())
            .unwrap();
        prop_assert!(summary.worst_case <= summary.consensus);
        prop_assert!(summary.consensus <= summary.best_case);
        prop_assert_eq!(summary.per_model.len(), forecasts.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn backtest_record_count(
        rows in 25usize..60,
        start_size in 1usize..50,
        max_steps in 1usize..20,
    ) {
        // Five extra rows cover the single lag of 5
        let rates: Vec<i64> = (0..rows + 5).map(|i| 2000 + ((i * 13) % 29) as i64).collect();
        let lags = LagConfig::new(vec![1, 5]).unwrap();
        let table = LagFeatureBuilder::new(lags.clone()).build(&series(&rates)).unwrap();
        prop_assert_eq!(table.len(), rows);

        let config = BacktestConfig {
            start_size,
            max_steps,
            parallel: false,
            ..Default::default()
        };
        let result = WalkForwardBacktester::new(config, lags).run(&table, &registry());

        let end = rows.min(start_size + max_steps);
        if end > start_size {
            let result = result.unwrap();
            prop_assert_eq!(result.records.len(), 2 * (end - start_size));
        } else {
            let is_insufficient = matches!(result, Err(ForecastError::InsufficientHistory { .. }));
            prop_assert!(is_insufficient);
        }
    }
}

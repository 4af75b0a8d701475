//! Caller-owned cache of backtest results.
//!
//! Entries are keyed by a SHA-256 digest of the table contents, the lag
//! columns, the model settings and the backtest window parameters. The
//! backtester itself stays stateless; a caller that wants reuse keeps one of
//! these next to it.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::backtester::{BacktestConfig, BacktestResult, ProgressObserver, WalkForwardBacktester};
use crate::error::{ForecastError, ForecastResult};
use crate::features::LagTable;
use crate::models::ModelRegistry;

/// Hex digest identifying one backtest input.
///
/// Configured models contribute their full settings. Caller-supplied
/// factories are opaque, so they contribute only their name.
pub fn cache_key(
    table: &LagTable,
    config: &BacktestConfig,
    registry: &ModelRegistry,
) -> ForecastResult<String> {
    let mut hasher = Sha256::new();

    for lag in table.config().lags() {
        hasher.update((*lag as u64).to_le_bytes());
    }
    for row in table.rows() {
        hasher.update(row.date.to_string().as_bytes());
        hasher.update(row.target.to_bits().to_le_bytes());
        for value in &row.lags {
            hasher.update(value.to_bits().to_le_bytes());
        }
    }

    hasher.update((config.window as u64).to_le_bytes());
    hasher.update((config.start_size as u64).to_le_bytes());
    hasher.update((config.max_steps as u64).to_le_bytes());

    for model in registry.models() {
        hasher.update((model.name.len() as u64).to_le_bytes());
        hasher.update(model.name.as_bytes());
        match model.spec() {
            Some(spec) => {
                let bytes = serde_json::to_vec(spec).map_err(|e| {
                    ForecastError::InvalidParameter(format!(
                        "cannot hash settings of {}: {}",
                        model.name, e
                    ))
                })?;
                hasher.update(b"spec");
                hasher.update(&bytes);
            }
            None => hasher.update(b"factory"),
        }
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Memoised backtest results.
#[derive(Debug, Default)]
pub struct BacktestCache {
    entries: HashMap<String, Arc<BacktestResult>>,
    hits: usize,
    misses: usize,
}

impl BacktestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn get(&self, key: &str) -> Option<Arc<BacktestResult>> {
        self.entries.get(key).cloned()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return the cached result for these inputs, running the backtest on a
    /// miss. Failed runs are not cached.
    pub fn get_or_run(
        &mut self,
        backtester: &WalkForwardBacktester,
        table: &LagTable,
        registry: &ModelRegistry,
        progress: Option<ProgressObserver<'_>>,
    ) -> ForecastResult<Arc<BacktestResult>> {
        let table = table.with_lags(backtester.lags())?;
        let key = cache_key(&table, backtester.config(), registry)?;

        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            debug!("Backtest cache hit {}", &key[..12]);
            return Ok(Arc::clone(hit));
        }

        self.misses += 1;
        let result = Arc::new(backtester.run_with_progress(&table, registry, progress)?);
        self.entries.insert(key, Arc::clone(&result));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RateObservation, RateSeries};
    use crate::features::{LagConfig, LagFeatureBuilder};
    use crate::models::{LinearConfig, LinearRegression, ModelSpec, NamedModelSpec, TreeConfig};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn table(n: usize, offset: i64) -> LagTable {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let series = RateSeries::new(
            (0..n)
                .map(|i| {
                    RateObservation::new(
                        start + chrono::Duration::days(i as i64),
                        Decimal::new(1800 + offset + 3 * i as i64, 2),
                    )
                })
                .collect(),
        )
        .unwrap();
        LagFeatureBuilder::default().build(&series).unwrap()
    }

    fn registry() -> ModelRegistry {
        ModelRegistry::new(vec![NamedModelSpec::new(
            "Linear",
            ModelSpec::LinearRegression(LinearConfig::default()),
        )])
        .unwrap()
    }

    fn backtester(start_size: usize) -> WalkForwardBacktester {
        WalkForwardBacktester::new(
            BacktestConfig {
                start_size,
                max_steps: 5,
                ..Default::default()
            },
            LagConfig::default(),
        )
    }

    fn key(table: &LagTable, config: &BacktestConfig, registry: &ModelRegistry) -> String {
        cache_key(table, config, registry).unwrap()
    }

    #[test]
    fn test_key_is_stable_and_sensitive() {
        let config = BacktestConfig::default();
        let a = key(&table(40, 0), &config, &registry());
        assert_eq!(a, key(&table(40, 0), &config, &registry()));
        assert_eq!(a.len(), 64);

        assert_ne!(a, key(&table(40, 1), &config, &registry()));
        assert_ne!(a, key(&table(41, 0), &config, &registry()));

        let other = BacktestConfig {
            max_steps: 10,
            ..Default::default()
        };
        assert_ne!(a, key(&table(40, 0), &other, &registry()));

        // Scheduling does not change results, so it is not part of the key
        let sequential = BacktestConfig {
            parallel: false,
            ..Default::default()
        };
        assert_eq!(a, key(&table(40, 0), &sequential, &registry()));
    }

    #[test]
    fn test_key_tracks_model_settings() {
        let config = BacktestConfig::default();
        let tree = |depth| {
            ModelRegistry::new(vec![NamedModelSpec::new(
                "Tree",
                ModelSpec::DecisionTree(TreeConfig {
                    max_depth: Some(depth),
                    ..Default::default()
                }),
            )])
            .unwrap()
        };
        assert_ne!(key(&table(40, 0), &config, &tree(3)), key(&table(40, 0), &config, &tree(4)));

        // Factories are keyed by name
        let custom = |name: &str| {
            ModelRegistry::from_factory(name, || Box::new(LinearRegression::default()))
        };
        assert_eq!(
            key(&table(40, 0), &config, &custom("Custom")),
            key(&table(40, 0), &config, &custom("Custom"))
        );
        assert_ne!(
            key(&table(40, 0), &config, &custom("Custom")),
            key(&table(40, 0), &config, &custom("Other"))
        );
        assert_ne!(
            key(&table(40, 0), &config, &custom("Linear")),
            key(&table(40, 0), &config, &registry())
        );
    }

    #[test]
    fn test_get_or_run_memoises() {
        let mut cache = BacktestCache::new();
        let table = table(50, 0);

        let first = cache.get_or_run(&backtester(20), &table, &registry(), None).unwrap();
        let second = cache.get_or_run(&backtester(20), &table, &registry(), None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        cache.get_or_run(&backtester(21), &table, &registry(), None).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_failures_not_cached() {
        let mut cache = BacktestCache::new();
        let result = cache.get_or_run(&backtester(100), &table(50, 0), &registry(), None);
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}

//! Engine configuration.
//!
//! Everything that is a choice rather than engine logic lives here: lag
//! columns, input column names, horizons, backtest window and the model set.
//! Loadable from TOML; every field has a default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{DataLoader, DEFAULT_DATE_COLUMN, DEFAULT_DATE_FORMAT, DEFAULT_TARGET_COLUMN};
use crate::error::ForecastError;
use crate::features::LagConfig;
use crate::forecast::{EnsembleAggregator, RecursiveForecaster, DEFAULT_LOOKBACK_WEEKS, DEFAULT_SUMMARY_DAY};
use crate::models::{default_model_specs, ModelRegistry, NamedModelSpec};
use crate::walkforward::{BacktestConfig, WalkForwardBacktester};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ForecastError),
}

/// Forecast horizon settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    /// Steps to project
    pub horizon: usize,
    /// 1-based day summarised by the ensemble (end of week by default)
    pub summary_day: usize,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            horizon: 30,
            summary_day: DEFAULT_SUMMARY_DAY,
        }
    }
}

/// Weekly comparison settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlookSettings {
    /// Past weeks in the trend comparison
    pub lookback_weeks: usize,
}

impl Default for OutlookSettings {
    fn default() -> Self {
        Self {
            lookback_weeks: DEFAULT_LOOKBACK_WEEKS,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub lags: LagConfig,
    pub date_column: String,
    pub target_column: String,
    pub date_format: String,
    pub forecast: ForecastSettings,
    pub backtest: BacktestConfig,
    pub outlook: OutlookSettings,
    pub models: Vec<NamedModelSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lags: LagConfig::default(),
            date_column: DEFAULT_DATE_COLUMN.to_string(),
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            forecast: ForecastSettings::default(),
            backtest: BacktestConfig::default(),
            outlook: OutlookSettings::default(),
            models: default_model_specs(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check every section can build its engine component.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.forecaster()?;
        self.aggregator()?;
        self.registry()?;
        self.backtest.validate()?;
        Ok(())
    }

    pub fn loader(&self) -> DataLoader {
        DataLoader::new(&self.date_column, &self.target_column).with_date_format(&self.date_format)
    }

    pub fn registry(&self) -> Result<ModelRegistry, ForecastError> {
        ModelRegistry::new(self.models.clone())
    }

    pub fn forecaster(&self) -> Result<RecursiveForecaster, ForecastError> {
        RecursiveForecaster::new(self.forecast.horizon)
    }

    pub fn aggregator(&self) -> Result<EnsembleAggregator, ForecastError> {
        EnsembleAggregator::new(self.forecast.summary_day)
    }

    pub fn backtester(&self) -> WalkForwardBacktester {
        WalkForwardBacktester::new(self.backtest.clone(), self.lags.clone())
    }
}

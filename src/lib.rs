pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod forecast;
pub mod metrics;
pub mod models;
pub mod validation;
pub mod walkforward;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use data::{DataLoader, LoaderError, RateObservation, RateSeries};
pub use error::{ForecastError, ForecastResult};
pub use features::{LagConfig, LagFeatureBuilder, LagTable, LaggedRow};
pub use forecast::{
    EnsembleAggregator, EnsembleSummary, ForecastRun, ForecastSeries, Outlook, RecursiveForecaster,
};
pub use metrics::{ErrorCalculator, ModelErrorStats};
pub use models::{ModelError, ModelHandle, ModelRegistry, ModelSpec, NamedModelSpec, Regressor};
pub use validation::{DataIntegrityReport, DataIntegrityValidator};
pub use walkforward::{BacktestCache, BacktestConfig, BacktestRecord, BacktestResult, WalkForwardBacktester};

//! Feature engineering.
//!
//! Lag features over the target rate series.

pub mod lags;

pub use lags::{LagConfig, LagFeatureBuilder, LagTable, LaggedRow};

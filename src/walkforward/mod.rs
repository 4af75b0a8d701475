//! Walk-forward validation module.
//!
//! Expanding-window evaluation of the model ensemble:
//! - Train: rows `[0, i)`, every model from scratch
//! - Test: one-step prediction of row `i`
//! - Roll: one row per step, up to `max_steps`

pub mod backtester;
pub mod cache;

pub use backtester::{
    BacktestConfig, BacktestRecord, BacktestResult, ProgressObserver, WalkForwardBacktester,
};
pub use cache::{cache_key, BacktestCache};

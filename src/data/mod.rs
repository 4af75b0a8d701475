//! Rate series input.
//!
//! Core series types and the CSV loader for the date/rate input contract.

pub mod loader;
pub mod types;

pub use loader::{
    DataLoader, LoaderError, DEFAULT_DATE_COLUMN, DEFAULT_DATE_FORMAT, DEFAULT_TARGET_COLUMN,
};
pub use types::{RateObservation, RateSeries};

//! Input data validation.
//!
//! Checks a rate series against the engine's input contract before any
//! features are built.

pub mod data_integrity;

pub use data_integrity::{CheckResult, DataIntegrityReport, DataIntegrityValidator};

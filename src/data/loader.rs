//! CSV loader for rate series.
//!
//! The input file needs at least a date column and a numeric rate column.
//! Header matching is case-insensitive and ignores surrounding whitespace,
//! so `DATE`, `date` and ` Date ` all resolve to the same column.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use super::types::{RateObservation, RateSeries};

/// Default date column name.
pub const DEFAULT_DATE_COLUMN: &str = "DATE";

/// Default target column name.
pub const DEFAULT_TARGET_COLUMN: &str = "SELLING RATE";

/// Default date format.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid data at line {line}: {message}")]
    InvalidData { line: u64, message: String },

    #[error("Duplicate observation date: {0}")]
    DuplicateDate(NaiveDate),
}

/// CSV rate loader.
#[derive(Debug, Clone)]
pub struct DataLoader {
    date_column: String,
    target_column: String,
    date_format: String,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_COLUMN, DEFAULT_TARGET_COLUMN)
    }
}

impl DataLoader {
    /// Create a loader reading the given date and target columns.
    pub fn new(date_column: &str, target_column: &str) -> Self {
        Self {
            date_column: date_column.to_string(),
            target_column: target_column.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    /// Set the date format (chrono `strftime` syntax).
    pub fn with_date_format(mut self, format: &str) -> Self {
        self.date_format = format.to_string();
        self
    }

    /// Load a series from a CSV file.
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<RateSeries, LoaderError> {
        let file = File::open(path.as_ref())?;
        debug!("Loading rates from {}", path.as_ref().display());
        self.load_reader(file)
    }

    /// Load a series from any CSV reader.
    pub fn load_reader<R: Read>(&self, reader: R) -> Result<RateSeries, LoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let date_idx = find_column(&headers, &self.date_column)?;
        let rate_idx = find_column(&headers, &self.target_column)?;

        let mut observations = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let date_str = record.get(date_idx).unwrap_or("");
            let rate_str = record.get(rate_idx).unwrap_or("");

            // Fully blank rows are tolerated (trailing spreadsheet exports)
            if date_str.is_empty() && rate_str.is_empty() {
                continue;
            }

            let date = NaiveDate::parse_from_str(date_str, &self.date_format).map_err(|e| {
                LoaderError::InvalidData {
                    line,
                    message: format!("invalid date '{}': {}", date_str, e),
                }
            })?;

            let rate = parse_rate(rate_str).ok_or_else(|| LoaderError::InvalidData {
                line,
                message: format!("invalid rate '{}'", rate_str),
            })?;

            observations.push(RateObservation::new(date, rate));
        }

        RateSeries::new(observations)
    }
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Result<usize, LoaderError> {
    let wanted = name.trim().to_uppercase();
    headers
        .iter()
        .position(|h| h.trim().to_uppercase() == wanted)
        .ok_or_else(|| LoaderError::MissingColumn(name.to_string()))
}

/// Parse a rate, accepting thousands separators.
fn parse_rate(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_load_reader_sorts_rows() {
        let csv = "DATE,BUYING RATE,SELLING RATE\n\
                   2024-01-03,20.10,20.30\n\
                   2024-01-02,20.00,20.20\n";
        let series = DataLoader::default().load_reader(csv.as_bytes()).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.observations()[0].rate, dec!(20.20));
        assert_eq!(series.observations()[1].rate, dec!(20.30));
    }

    #[test]
    fn test_header_matching_is_case_insensitive() {
        let csv_quoted = " date , selling rate \n2024-01-02,\"1,234.5\"\n";
        let series = DataLoader::default()
            .load_reader(csv_quoted.as_bytes())
            .unwrap();
        assert_eq!(series.observations()[0].rate, dec!(1234.5));
    }

    #[test]
    fn test_missing_column() {
        let csv = "DATE,RATE\n2024-01-02,20.0\n";
        let err = DataLoader::default().load_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(c) if c == "SELLING RATE"));
    }

    #[test]
    fn test_missing_rate_value_is_rejected() {
        let csv = "DATE,SELLING RATE\n2024-01-02,20.0\n2024-01-03,\n";
        let err = DataLoader::default().load_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidData { .. }));
    }

    #[test]
    fn test_duplicate_dates_rejected() {
        let csv = "DATE,SELLING RATE\n2024-01-02,20.0\n2024-01-02,20.1\n";
        let err = DataLoader::default().load_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoaderError::DuplicateDate(_)));
    }

    #[test]
    fn test_custom_columns_and_format() {
        let csv = "day,rate\n02/01/2024,19.5\n";
        let series = DataLoader::new("day", "rate")
            .with_date_format("%d/%m/%Y")
            .load_reader(csv.as_bytes())
            .unwrap();
        assert_eq!(
            series.observations()[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn test_load_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "DATE,SELLING RATE").unwrap();
        writeln!(file, "2024-01-02,20.0").unwrap();
        let series = DataLoader::default().load_path(file.path()).unwrap();
        assert_eq!(series.len(), 1);
    }
}

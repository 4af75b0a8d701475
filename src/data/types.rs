//! Core data types for the rate series.
//!
//! A `RateSeries` is the read-only input to the engine: one observation per
//! date, strictly increasing in date.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::loader::LoaderError;

/// One sampled point of the target series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateObservation {
    /// Observation date
    pub date: NaiveDate,

    /// Rate observed on that date (e.g. selling rate)
    pub rate: Decimal,
}

impl RateObservation {
    pub fn new(date: NaiveDate, rate: Decimal) -> Self {
        Self { date, rate }
    }

    /// Rate as a float for model input.
    pub fn rate_f64(&self) -> f64 {
        self.rate.to_f64().unwrap_or(f64::NAN)
    }
}

/// Date-ordered, duplicate-free rate series.
///
/// Deserialization goes through [`RateSeries::new`], so serialized input is
/// sorted and checked for duplicate dates like any other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RateObservation>", into = "Vec<RateObservation>")]
pub struct RateSeries {
    observations: Vec<RateObservation>,
}

impl RateSeries {
    /// Build a series from unordered observations.
    ///
    /// Sorts by date and rejects two observations sharing a date.
    pub fn new(mut observations: Vec<RateObservation>) -> Result<Self, LoaderError> {
        observations.sort_by_key(|o| o.date);

        if let Some(pair) = observations.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(LoaderError::DuplicateDate(pair[0].date));
        }

        Ok(Self { observations })
    }

    pub fn observations(&self) -> &[RateObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Most recent observation.
    pub fn last(&self) -> Option<&RateObservation> {
        self.observations.last()
    }

    /// Date range covered by the series.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.observations.first(), self.observations.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }

    /// Rates as floats, in date order.
    pub fn rates_f64(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.rate_f64()).collect()
    }

    /// Keep only the most recent `n` observations.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.observations.len().saturating_sub(n);
        Self {
            observations: self.observations[start..].to_vec(),
        }
    }
}

impl TryFrom<Vec<RateObservation>> for RateSeries {
    type Error = LoaderError;

    fn try_from(observations: Vec<RateObservation>) -> Result<Self, Self::Error> {
        Self::new(observations)
    }
}

impl From<RateSeries> for Vec<RateObservation> {
    fn from(series: RateSeries) -> Self {
        series.observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_series_sorts_by_date() {
        let series = RateSeries::new(vec![
            RateObservation::new(date(3), dec!(21.3)),
            RateObservation::new(date(1), dec!(21.1)),
            RateObservation::new(date(2), dec!(21.2)),
        ])
        .unwrap();

        let dates: Vec<_> = series.observations().iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![date(1), date(2), date(3)]);
        assert_eq!(series.date_range(), Some((date(1), date(3))));
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let result = RateSeries::new(vec![
            RateObservation::new(date(1), dec!(21.1)),
            RateObservation::new(date(1), dec!(21.2)),
        ]);
        assert!(matches!(result, Err(LoaderError::DuplicateDate(d)) if d == date(1)));
    }

    #[test]
    fn test_deserialize_sorts_and_rejects_duplicates() {
        let unsorted = r#"[
            {"date": "2024-01-03", "rate": "20.3"},
            {"date": "2024-01-01", "rate": "20.1"}
        ]"#;
        let series: RateSeries = serde_json::from_str(unsorted).unwrap();
        assert_eq!(series.date_range(), Some((date(1), date(3))));

        let duplicated = r#"[
            {"date": "2024-01-03", "rate": "20.3"},
            {"date": "2024-01-01", "rate": "20.1"},
            {"date": "2024-01-01", "rate": "99.9"}
        ]"#;
        let err = serde_json::from_str::<RateSeries>(duplicated).unwrap_err();
        assert!(err.to_string().contains("Duplicate observation date"));
    }

    #[test]
    fn test_serialize_round_trip() {
        let series = RateSeries::new(vec![
            RateObservation::new(date(2), dec!(21.2)),
            RateObservation::new(date(1), dec!(21.1)),
        ])
        .unwrap();
        let json = serde_json::to_string(&series).unwrap();
        assert!(json.starts_with('['));
        assert_eq!(serde_json::from_str::<RateSeries>(&json).unwrap(), series);
    }

    #[test]
    fn test_tail() {
        let series = RateSeries::new(
            (1..=5)
                .map(|d| RateObservation::new(date(d), Decimal::from(d)))
                .collect(),
        )
        .unwrap();
        let tail = series.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.observations()[0].date, date(4));
        assert_eq!(series.tail(10).len(), 5);
    }

    #[test]
    fn test_rate_f64() {
        let obs = RateObservation::new(date(1), dec!(26.4512));
        assert!((obs.rate_f64() - 26.4512).abs() < 1e-12);
    }
}

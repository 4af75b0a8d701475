//! Data integrity validation for rate series.
//!
//! Validates:
//! - History length (enough rows to build every configured lag)
//! - Rate validity (strictly positive, finite)
//! - Date continuity (no gaps longer than a week, weekends ignored)
//! - Jump detection (day-over-day moves beyond a configured fraction)

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::RateSeries;
use crate::features::LagConfig;

/// Result of a single validation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Complete data integrity report for a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataIntegrityReport {
    pub observations: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub checks: Vec<CheckResult>,
}

impl DataIntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let total = self.checks.len();
        let range = match (self.first_date, self.last_date) {
            (Some(first), Some(last)) => format!("{} to {}", first, last),
            _ => "empty".to_string(),
        };
        format!(
            "{} observations ({}): {}/{} checks passed",
            self.observations, range, passed, total
        )
    }
}

/// Validator for rate series integrity.
#[derive(Debug, Clone)]
pub struct DataIntegrityValidator {
    lags: LagConfig,
    max_gap_days: i64,
    max_jump_pct: f64,
}

impl Default for DataIntegrityValidator {
    fn default() -> Self {
        Self::new(LagConfig::default())
    }
}

impl DataIntegrityValidator {
    pub fn new(lags: LagConfig) -> Self {
        Self {
            lags,
            max_gap_days: 7,
            max_jump_pct: 10.0,
        }
    }

    /// Largest tolerated calendar gap between consecutive observations.
    pub fn with_max_gap_days(mut self, days: i64) -> Self {
        self.max_gap_days = days;
        self
    }

    /// Largest tolerated day-over-day move, in percent.
    pub fn with_max_jump_pct(mut self, pct: f64) -> Self {
        self.max_jump_pct = pct;
        self
    }

    /// Run all validation checks.
    pub fn validate(&self, series: &RateSeries) -> DataIntegrityReport {
        let (first_date, last_date) = series
            .date_range()
            .map_or((None, None), |(a, b)| (Some(a), Some(b)));

        let checks = vec![
            self.check_history_length(series),
            self.check_rate_validity(series),
            self.check_date_continuity(series),
            self.check_jumps(series),
        ];

        DataIntegrityReport {
            observations: series.len(),
            first_date,
            last_date,
            checks,
        }
    }

    /// Check that the series outlives the largest lag.
    fn check_history_length(&self, series: &RateSeries) -> CheckResult {
        let max_lag = self.lags.max_lag();
        if series.len() > max_lag {
            CheckResult::pass(
                "history_length",
                &format!(
                    "{} observations, {} usable after lag {}",
                    series.len(),
                    series.len() - max_lag,
                    max_lag
                ),
            )
        } else {
            CheckResult::fail(
                "history_length",
                "Not enough observations for the configured lags",
                Some(format!(
                    "{} observations, need more than {}",
                    series.len(),
                    max_lag
                )),
            )
        }
    }

    /// Check rates are strictly positive.
    fn check_rate_validity(&self, series: &RateSeries) -> CheckResult {
        let invalid: Vec<String> = series
            .observations()
            .iter()
            .filter(|o| o.rate <= Decimal::ZERO)
            .map(|o| format!("{}: {}", o.date, o.rate))
            .collect();

        if invalid.is_empty() {
            CheckResult::pass("rate_validity", "All rates positive")
        } else {
            CheckResult::fail(
                "rate_validity",
                &format!("{} non-positive rates", invalid.len()),
                Some(invalid.join(", ")),
            )
        }
    }

    /// Check for unexpected gaps between observations.
    fn check_date_continuity(&self, series: &RateSeries) -> CheckResult {
        let mut gaps = Vec::new();

        for window in series.observations().windows(2) {
            let (prev, curr) = (window[0].date, window[1].date);
            // Weekend gaps are expected, so measure from the next business day
            let gap_days = (curr - next_business_day(prev)).num_days() + 1;
            if gap_days > self.max_gap_days {
                gaps.push(format!("{} to {} ({} days)", prev, curr, gap_days));
            }
        }

        if gaps.is_empty() {
            CheckResult::pass("date_continuity", "No major gaps")
        } else {
            CheckResult::fail(
                "date_continuity",
                &format!("{} major gaps found", gaps.len()),
                Some(gaps.join(", ")),
            )
        }
    }

    /// Flag implausible day-over-day moves (usually data entry errors).
    fn check_jumps(&self, series: &RateSeries) -> CheckResult {
        let mut jumps = Vec::new();

        for window in series.observations().windows(2) {
            let prev = window[0].rate_f64();
            let curr = window[1].rate_f64();
            if prev <= 0.0 {
                continue;
            }
            let pct = (curr - prev) / prev * 100.0;
            if pct.abs() > self.max_jump_pct {
                jumps.push(format!("{} ({:+.2}%)", window[1].date, pct));
            }
        }

        if jumps.is_empty() {
            CheckResult::pass(
                "jump_detection",
                &format!("No moves larger than {:.1}%", self.max_jump_pct),
            )
        } else {
            CheckResult::fail(
                "jump_detection",
                &format!("{} suspicious jumps", jumps.len()),
                Some(jumps.join(", ")),
            )
        }
    }
}

/// Get the next business day (skip weekends).
fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RateObservation;
    use rust_decimal_macros::dec;

    fn business_days(n: usize, rate: Decimal) -> RateSeries {
        let mut date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut obs = Vec::new();
        for _ in 0..n {
            obs.push(RateObservation::new(date, rate));
            date = next_business_day(date);
        }
        RateSeries::new(obs).unwrap()
    }

    #[test]
    fn test_next_business_day() {
        // Friday -> Monday
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            next_business_day(friday),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );

        // Monday -> Tuesday
        let monday = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(
            next_business_day(monday),
            NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()
        );
    }

    #[test]
    fn test_check_result() {
        let pass = CheckResult::pass("test", "passed");
        assert!(pass.passed);

        let fail = CheckResult::fail("test", "failed", Some("details".to_string()));
        assert!(!fail.passed);
        assert_eq!(fail.details, Some("details".to_string()));
    }

    #[test]
    fn test_clean_series_passes() {
        let series = business_days(40, dec!(21.5));
        let report = DataIntegrityValidator::default().validate(&series);
        assert!(report.all_passed(), "{:?}", report.failed_checks());
        assert_eq!(report.observations, 40);
    }

    #[test]
    fn test_short_series_fails_history_check() {
        let series = business_days(20, dec!(21.5));
        let report = DataIntegrityValidator::default().validate(&series);
        let failed: Vec<_> = report.failed_checks().iter().map(|c| c.name.clone()).collect();
        assert_eq!(failed, vec!["history_length".to_string()]);
    }

    #[test]
    fn test_gap_and_jump_detected() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        let series = RateSeries::new(vec![
            RateObservation::new(d(1, 2), dec!(20.0)),
            RateObservation::new(d(1, 3), dec!(20.1)),
            RateObservation::new(d(2, 1), dec!(20.2)),
            RateObservation::new(d(2, 2), dec!(30.0)),
        ])
        .unwrap();

        let report = DataIntegrityValidator::new(LagConfig::new(vec![1]).unwrap()).validate(&series);
        let failed: Vec<_> = report.failed_checks().iter().map(|c| c.name.clone()).collect();
        assert!(failed.contains(&"date_continuity".to_string()));
        assert!(failed.contains(&"jump_detection".to_string()));
        assert!(!failed.contains(&"history_length".to_string()));
    }

    #[test]
    fn test_non_positive_rate() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let series = RateSeries::new(vec![
            RateObservation::new(d(2), dec!(20.0)),
            RateObservation::new(d(3), dec!(0)),
        ])
        .unwrap();
        let report = DataIntegrityValidator::new(LagConfig::new(vec![1]).unwrap())
            .with_max_jump_pct(1000.0)
            .validate(&series);
        assert_eq!(report.failed_checks().len(), 1);
        assert_eq!(report.failed_checks()[0].name, "rate_validity");
    }
}

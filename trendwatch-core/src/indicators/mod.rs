//! Moving-average and slope calculators.
//!
//! Both are pure functions over ordered weekly data. Insufficient history
//! yields an empty output rather than an error; zero-length windows and
//! malformed series are rejected.

pub mod slope;
pub mod sma;

pub use slope::{calculate_rolling_slope, current_slope_direction, has_never_had_negative_slope};
pub use sma::{calculate_flexible_sma, calculate_sma, current_sma, FlexibleSma};

/// Create a weekly series from close prices for testing.
///
/// Week endings are consecutive Fridays starting 2015-01-02.
#[cfg(test)]
pub fn make_series(closes: &[f64]) -> Vec<crate::domain::WeeklyClose> {
    use crate::domain::WeeklyClose;
    let base_date = chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| WeeklyClose::new(base_date + chrono::Duration::weeks(i as i64), close))
        .collect()
}

/// Create SMA points from raw values for testing.
#[cfg(test)]
pub fn make_sma_points(values: &[f64]) -> Vec<crate::domain::SmaPoint> {
    use crate::domain::SmaPoint;
    let base_date = chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| SmaPoint {
            week_ending: base_date + chrono::Duration::weeks(i as i64),
            value,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-9;

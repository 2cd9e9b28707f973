//! Rolling slope of the moving average.
//!
//! slope[i] = (sma[i] - sma[i - lag]) / lag, for i >= lag.
//! A fixed-lag discrete derivative, not a regression fit.

use crate::domain::{SlopeDirection, SlopePoint, SmaPoint};
use crate::error::{check_window, SignalError};

/// Rolling slope series. Empty when `points.len() <= rolling_window`.
pub fn calculate_rolling_slope(
    points: &[SmaPoint],
    rolling_window: usize,
) -> Result<Vec<SlopePoint>, SignalError> {
    check_window("rolling_window", rolling_window)?;

    if points.len() <= rolling_window {
        return Ok(Vec::new());
    }

    let lag = rolling_window as f64;
    let slopes = points
        .iter()
        .zip(&points[rolling_window..])
        .map(|(earlier, current)| SlopePoint {
            week_ending: current.week_ending,
            slope: (current.value - earlier.value) / lag,
        })
        .collect();

    Ok(slopes)
}

/// True iff every slope among the most recent `lookback` entries is >= 0.
///
/// An empty slope series is a failed check: no trend data is not a healthy trend.
/// Entries older than the lookback window are ignored.
pub fn has_never_had_negative_slope(
    slopes: &[SlopePoint],
    lookback: usize,
) -> Result<bool, SignalError> {
    check_window("lookback", lookback)?;

    if slopes.is_empty() {
        return Ok(false);
    }

    let start = slopes.len().saturating_sub(lookback);
    Ok(slopes[start..].iter().all(|s| s.slope >= 0.0))
}

/// Direction of the latest slope; `Down` when there is none.
pub fn current_slope_direction(slopes: &[SlopePoint]) -> SlopeDirection {
    match slopes.last() {
        Some(s) if s.slope >= 0.0 => SlopeDirection::Up,
        _ => SlopeDirection::Down,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_sma_points, DEFAULT_EPSILON};

    fn slopes_from(values: &[f64]) -> Vec<SlopePoint> {
        make_sma_points(values)
            .into_iter()
            .map(|p| SlopePoint {
                week_ending: p.week_ending,
                slope: p.value,
            })
            .collect()
    }

    #[test]
    fn empty_when_not_enough_points() {
        let points = make_sma_points(&[100.0, 101.0, 102.0, 103.0]);
        assert!(calculate_rolling_slope(&points, 4).unwrap().is_empty());
    }

    #[test]
    fn linear_sma_has_constant_slope() {
        let points = make_sma_points(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let slopes = calculate_rolling_slope(&points, 4).unwrap();
        assert_eq!(slopes.len(), 2);
        for s in &slopes {
            assert_approx(s.slope, 1.0, DEFAULT_EPSILON);
        }
        assert_eq!(slopes[0].week_ending, points[4].week_ending);
        assert_eq!(slopes[1].week_ending, points[5].week_ending);
    }

    #[test]
    fn declining_sma_has_negative_slope() {
        let points = make_sma_points(&[100.0, 99.0, 98.0, 97.0, 96.0]);
        let slopes = calculate_rolling_slope(&points, 4).unwrap();
        assert_eq!(slopes.len(), 1);
        assert_approx(slopes[0].slope, -1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn dip_after_rise_still_positive_over_lag() {
        let points = make_sma_points(&[100.0, 102.0, 104.0, 106.0, 105.0, 104.0]);
        let slopes = calculate_rolling_slope(&points, 4).unwrap();
        assert_approx(slopes[0].slope, 1.25, DEFAULT_EPSILON);
        assert_approx(slopes[1].slope, 0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn zero_rolling_window_rejected() {
        let points = make_sma_points(&[1.0, 2.0]);
        assert!(calculate_rolling_slope(&points, 0).is_err());
    }

    #[test]
    fn never_negative_empty_is_false() {
        assert!(!has_never_had_negative_slope(&[], 364).unwrap());
    }

    #[test]
    fn never_negative_all_positive_and_all_zero() {
        assert!(has_never_had_negative_slope(&slopes_from(&[0.5; 400]), 364).unwrap());
        assert!(has_never_had_negative_slope(&slopes_from(&[0.0; 400]), 364).unwrap());
    }

    #[test]
    fn negative_inside_lookback_fails() {
        let mut values = vec![1.0; 400];
        values[390] = -0.01;
        assert!(!has_never_had_negative_slope(&slopes_from(&values), 364).unwrap());
    }

    #[test]
    fn negative_outside_lookback_ignored() {
        // 500 - 364 = 136: indices 0..136 are older than the window
        let values: Vec<f64> = (0..500).map(|i| if i < 136 { -1.0 } else { 1.0 }).collect();
        assert!(has_never_had_negative_slope(&slopes_from(&values), 364).unwrap());
    }

    #[test]
    fn negative_at_lookback_boundary_counts() {
        let values: Vec<f64> = (0..500).map(|i| if i == 136 { -0.01 } else { 1.0 }).collect();
        assert!(!has_never_had_negative_slope(&slopes_from(&values), 364).unwrap());
    }

    #[test]
    fn short_history_examines_everything() {
        let values = [1.0, -0.5, 1.0];
        assert!(!has_never_had_negative_slope(&slopes_from(&values), 364).unwrap());
    }

    #[test]
    fn zero_lookback_rejected() {
        assert!(has_never_had_negative_slope(&slopes_from(&[1.0]), 0).is_err());
    }

    #[test]
    fn direction() {
        assert_eq!(current_slope_direction(&[]), SlopeDirection::Down);
        assert_eq!(current_slope_direction(&slopes_from(&[0.5, 1.0])), SlopeDirection::Up);
        assert_eq!(current_slope_direction(&slopes_from(&[0.5, -0.1])), SlopeDirection::Down);
        assert_eq!(current_slope_direction(&slopes_from(&[0.0])), SlopeDirection::Up);
    }
}

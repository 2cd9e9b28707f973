//! Simple Moving Average (SMA) over weekly closes.
//!
//! Rolling mean of the trailing `window` closes, kept as a running sum so the
//! whole series costs O(n). The first point is the mean of weeks
//! `[0, window)` and carries the date of week `window - 1`.

use serde::{Deserialize, Serialize};

use crate::domain::{validate_series, SmaPoint, WeeklyClose};
use crate::error::{check_window, SignalError};

/// Moving average computed with a possibly shortened period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexibleSma {
    pub points: Vec<SmaPoint>,
    /// Window actually used. Equals the full window when history suffices
    /// or when there is too little history to compute anything.
    pub period_used: usize,
}

impl FlexibleSma {
    /// True when a shortened period had to be used.
    pub fn is_partial(&self, full_window: usize) -> bool {
        !self.points.is_empty() && self.period_used < full_window
    }
}

/// Sliding-window SMA. Returns an empty vector when `series.len() < window`.
pub fn calculate_sma(series: &[WeeklyClose], window: usize) -> Result<Vec<SmaPoint>, SignalError> {
    check_window("window", window)?;
    validate_series(series)?;
    Ok(rolling_mean(series, window))
}

/// SMA that falls back to all available history for young tickers.
///
/// With at least `full_window` weeks this is `calculate_sma(series, full_window)`.
/// With fewer, but at least `min_window`, the period becomes `series.len()` and a
/// single point is produced. Below `min_window` nothing is computed.
pub fn calculate_flexible_sma(
    series: &[WeeklyClose],
    full_window: usize,
    min_window: usize,
) -> Result<FlexibleSma, SignalError> {
    check_window("full_window", full_window)?;
    check_window("min_window", min_window)?;
    if min_window > full_window {
        return Err(SignalError::WindowOrder {
            min_window,
            full_window,
        });
    }
    validate_series(series)?;

    let n = series.len();
    let period_used = if n >= full_window {
        full_window
    } else if n >= min_window {
        n
    } else {
        return Ok(FlexibleSma {
            points: Vec::new(),
            period_used: full_window,
        });
    };

    Ok(FlexibleSma {
        points: rolling_mean(series, period_used),
        period_used,
    })
}

/// Most recent SMA value, or `None` for an empty sequence.
pub fn current_sma(points: &[SmaPoint]) -> Option<f64> {
    points.last().map(|p| p.value)
}

fn rolling_mean(series: &[WeeklyClose], window: usize) -> Vec<SmaPoint> {
    let n = series.len();
    if n < window {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(n - window + 1);
    let period = window as f64;

    let mut sum: f64 = series[..window].iter().map(|w| w.close).sum();
    result.push(SmaPoint {
        week_ending: series[window - 1].week_ending,
        value: sum / period,
    });

    for i in window..n {
        sum += series[i].close - series[i - window].close;
        result.push(SmaPoint {
            week_ending: series[i].week_ending,
            value: sum / period,
        });
    }

    result
}

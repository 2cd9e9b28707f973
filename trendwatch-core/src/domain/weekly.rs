//! WeeklyClose: the fundamental market data unit.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// Closing price for one week, tagged with the week-ending date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeeklyClose {
    pub week_ending: NaiveDate,
    pub close: f64,
}

impl WeeklyClose {
    pub fn new(week_ending: NaiveDate, close: f64) -> Self {
        Self { week_ending, close }
    }

    /// Positive and finite close.
    pub fn is_sane(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// Friday that closes the trading week containing `date`.
///
/// Monday through Friday map to that week's Friday; Saturday and Sunday map
/// to the following Friday.
pub fn week_ending_for(date: NaiveDate) -> NaiveDate {
    // num_days_from_sunday: Sun = 0 .. Sat = 6
    let day = date.weekday().num_days_from_sunday() as i64;
    let offset = if day <= 5 { 5 - day } else { 5 + (7 - day) };
    date + Duration::days(offset)
}

/// Check the series invariants: every close positive and finite, week-ending
/// dates strictly increasing. Gaps between weeks are allowed.
pub fn validate_series(series: &[WeeklyClose]) -> Result<(), SignalError> {
    for week in series {
        if !week.is_sane() {
            return Err(SignalError::InvalidClose {
                week_ending: week.week_ending,
                close: week.close,
            });
        }
    }
    for pair in series.windows(2) {
        if pair[1].week_ending <= pair[0].week_ending {
            return Err(SignalError::UnorderedSeries {
                previous: pair[0].week_ending,
                next: pair[1].week_ending,
            });
        }
    }
    Ok(())
}

/// Sort by week and keep the last close seen for each week.
///
/// Providers occasionally return the in-progress week twice (once as the
/// weekly bar, once as the live bar); the later entry wins.
pub fn normalize_series(mut series: Vec<WeeklyClose>) -> Vec<WeeklyClose> {
    series.sort_by_key(|w| w.week_ending);
    let mut out: Vec<WeeklyClose> = Vec::with_capacity(series.len());
    for week in series {
        match out.last_mut() {
            Some(last) if last.week_ending == week.week_ending => *last = week,
            _ => out.push(week),
        }
    }
    out
}

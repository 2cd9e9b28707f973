//! Week-ending calendar for the daily job.

use chrono::{DateTime, NaiveDate, Utc};
use trendwatch_core::domain::{week_ending_for, WeeklyClose};

/// Week-ending Friday for the moment the job runs (UTC calendar date).
pub fn current_week_ending(now: DateTime<Utc>) -> NaiveDate {
    week_ending_for(now.date_naive())
}

/// Put the live price into `week_ending`'s slot.
///
/// Overwrites the close when that week is already present, otherwise inserts
/// it in date order. Returns true when a new week was added.
pub fn upsert_week(series: &mut Vec<WeeklyClose>, week_ending: NaiveDate, price: f64) -> bool {
    match series.binary_search_by(|w| w.week_ending.cmp(&week_ending)) {
        Ok(idx) => {
            series[idx].close = price;
            false
        }
        Err(idx) => {
            series.insert(idx, WeeklyClose::new(week_ending, price));
            true
        }
    }
}

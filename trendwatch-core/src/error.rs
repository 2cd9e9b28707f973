//! Argument errors raised by the signal engine.
//!
//! Missing history is not an error: calculators return empty sequences and
//! evaluators report "no signal". Only arguments that can never produce a
//! meaningful answer end up here.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("{name} must be at least 1 (got {value})")]
    InvalidWindow { name: &'static str, value: usize },

    #[error("min_window ({min_window}) must not exceed full_window ({full_window})")]
    WindowOrder { min_window: usize, full_window: usize },

    #[error("current price must be a positive finite number (got {0})")]
    InvalidPrice(f64),

    #[error("close for week ending {week_ending} must be a positive finite number (got {close})")]
    InvalidClose { week_ending: NaiveDate, close: f64 },

    #[error("weekly series is not strictly increasing: {previous} followed by {next}")]
    UnorderedSeries { previous: NaiveDate, next: NaiveDate },

    #[error("invalid threshold {name}: {reason}")]
    InvalidThreshold { name: &'static str, reason: String },
}

/// Reject a zero-length window.
pub(crate) fn check_window(name: &'static str, value: usize) -> Result<(), SignalError> {
    if value == 0 {
        return Err(SignalError::InvalidWindow { name, value });
    }
    Ok(())
}

/// Reject prices that are zero, negative, NaN or infinite.
pub(crate) fn check_price(price: f64) -> Result<(), SignalError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(SignalError::InvalidPrice(price));
    }
    Ok(())
}

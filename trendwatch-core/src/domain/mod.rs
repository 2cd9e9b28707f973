//! Domain types for trendwatch

pub mod signal;
pub mod weekly;

pub use signal::{BuyEvaluation, SellEvaluation, SignalType, SlopeDirection, SlopePoint, SmaPoint};
pub use weekly::{normalize_series, validate_series, week_ending_for, WeeklyClose};

/// Ticker type alias
pub type Ticker = String;

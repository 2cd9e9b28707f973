//! Derived series points and signal evaluation records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Moving-average value tagged with the last week of its window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmaPoint {
    pub week_ending: NaiveDate,
    pub value: f64,
}

/// Rolling slope of the moving average at one week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlopePoint {
    pub week_ending: NaiveDate,
    pub slope: f64,
}

/// Direction of the most recent slope. Zero counts as `Up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlopeDirection {
    Up,
    Down,
}

/// Classified recommendation for a stock in one evaluation cycle.
///
/// Exactly one applies per stock; see `signals::classify` for precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    Buy,
    SellHigh,
    SellLow,
    Neutral,
}

impl SignalType {
    pub const ALL: [SignalType; 4] = [
        SignalType::Buy,
        SignalType::SellHigh,
        SignalType::SellLow,
        SignalType::Neutral,
    ];

    pub fn is_sell(self) -> bool {
        matches!(self, Self::SellHigh | Self::SellLow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::SellHigh => "SELL_HIGH",
            Self::SellLow => "SELL_LOW",
            Self::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the buy rules.
///
/// `sma` and `percent_distance` are 0.0 when no moving average is available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuyEvaluation {
    pub meets_all_criteria: bool,
    pub price_above_sma: bool,
    pub slope_never_negative: bool,
    pub within_threshold: bool,
    pub current_price: f64,
    pub sma: f64,
    pub percent_distance: f64,
}

impl BuyEvaluation {
    pub(crate) fn no_signal(current_price: f64) -> Self {
        Self {
            meets_all_criteria: false,
            price_above_sma: false,
            slope_never_negative: false,
            within_threshold: false,
            current_price,
            sma: 0.0,
            percent_distance: 0.0,
        }
    }
}

/// Outcome of the sell rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellEvaluation {
    pub has_sell_signal: bool,
    pub is_far_above: bool,
    pub is_far_below: bool,
    pub current_price: f64,
    pub sma: f64,
    pub percent_distance: f64,
}

impl SellEvaluation {
    pub(crate) fn no_signal(current_price: f64) -> Self {
        Self {
            has_sell_signal: false,
            is_far_above: false,
            is_far_below: false,
            current_price,
            sma: 0.0,
            percent_distance: 0.0,
        }
    }
}

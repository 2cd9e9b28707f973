//! Strategy parameters: every window and threshold in one place.
//!
//! Defaults are the margin-adjusted set: buy within 8% above the SMA,
//! sell at 57% above or 2% below.

use serde::{Deserialize, Serialize};

use crate::error::SignalError;

pub const SMA_WEEKS: usize = 200;
pub const MIN_SMA_WEEKS: usize = 20;
pub const SLOPE_ROLLING_WEEKS: usize = 4;
/// Seven years of weekly slopes.
pub const SLOPE_HISTORY_WEEKS: usize = 364;
pub const BUY_ABOVE_SMA_MAX_PCT: f64 = 8.0;
pub const SELL_ABOVE_SMA_PCT: f64 = 57.0;
pub const SELL_BELOW_SMA_PCT: f64 = 2.0;

/// Tunable windows and thresholds for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub sma_weeks: usize,
    pub min_sma_weeks: usize,
    pub slope_rolling_weeks: usize,
    pub slope_history_weeks: usize,
    pub buy_max_above_pct: f64,
    pub sell_above_pct: f64,
    pub sell_below_pct: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            sma_weeks: SMA_WEEKS,
            min_sma_weeks: MIN_SMA_WEEKS,
            slope_rolling_weeks: SLOPE_ROLLING_WEEKS,
            slope_history_weeks: SLOPE_HISTORY_WEEKS,
            buy_max_above_pct: BUY_ABOVE_SMA_MAX_PCT,
            sell_above_pct: SELL_ABOVE_SMA_PCT,
            sell_below_pct: SELL_BELOW_SMA_PCT,
        }
    }
}

impl StrategyParams {
    /// Reject parameter sets that cannot produce meaningful signals.
    ///
    /// The buy ceiling must sit strictly below the sell-high floor so that a
    /// single price can never qualify for both.
    pub fn validate(&self) -> Result<(), SignalError> {
        let windows = [
            ("sma_weeks", self.sma_weeks),
            ("min_sma_weeks", self.min_sma_weeks),
            ("slope_rolling_weeks", self.slope_rolling_weeks),
            ("slope_history_weeks", self.slope_history_weeks),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(SignalError::InvalidWindow { name, value });
            }
        }
        if self.min_sma_weeks > self.sma_weeks {
            return Err(SignalError::WindowOrder {
                min_window: self.min_sma_weeks,
                full_window: self.sma_weeks,
            });
        }

        let thresholds = [
            ("buy_max_above_pct", self.buy_max_above_pct),
            ("sell_above_pct", self.sell_above_pct),
            ("sell_below_pct", self.sell_below_pct),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(SignalError::InvalidThreshold {
                    name,
                    reason: format!("must be a non-negative finite percentage (got {value})"),
                });
            }
        }
        if self.buy_max_above_pct >= self.sell_above_pct {
            return Err(SignalError::InvalidThreshold {
                name: "buy_max_above_pct",
                reason: format!(
                    "buy ceiling {}% overlaps sell-high floor {}%",
                    self.buy_max_above_pct, self.sell_above_pct
                ),
            });
        }
        Ok(())
    }

    pub fn buy_criteria(&self) -> BuyCriteria {
        BuyCriteria {
            max_above_pct: self.buy_max_above_pct,
            slope_lookback_weeks: self.slope_history_weeks,
        }
    }

    pub fn sell_criteria(&self) -> SellCriteria {
        SellCriteria {
            high_threshold_pct: self.sell_above_pct,
            low_threshold_pct: self.sell_below_pct,
        }
    }
}

/// Inputs to the buy rules beyond price and series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuyCriteria {
    /// Highest percent above the SMA that still counts as a buy.
    pub max_above_pct: f64,
    /// Number of recent slopes that must all be non-negative.
    pub slope_lookback_weeks: usize,
}

impl Default for BuyCriteria {
    fn default() -> Self {
        StrategyParams::default().buy_criteria()
    }
}

/// Inputs to the sell rules beyond price and series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellCriteria {
    /// Percent above the SMA at or beyond which the position is sold high.
    pub high_threshold_pct: f64,
    /// Percent below the SMA at or beyond which the position is sold low.
    pub low_threshold_pct: f64,
}

impl Default for SellCriteria {
    fn default() -> Self {
        StrategyParams::default().sell_criteria()
    }
}

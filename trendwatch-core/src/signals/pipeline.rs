//! Single-stock pipeline: weekly closes + live price → classified signal.
//!
//! Flexible SMA → rolling slope → buy rules → sell rules → classification.
//! Stateless; the daily job calls this once per ticker.

use serde::{Deserialize, Serialize};

use crate::domain::{
    BuyEvaluation, SellEvaluation, SignalType, SlopeDirection, SlopePoint, SmaPoint, WeeklyClose,
};
use crate::error::SignalError;
use crate::indicators::{
    calculate_flexible_sma, calculate_rolling_slope, current_slope_direction,
    has_never_had_negative_slope,
};

use super::buy::evaluate_buy;
use super::classify::classify;
use super::params::StrategyParams;
use super::sell::evaluate_sell;

/// Everything derived for one stock in one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEvaluation {
    pub current_price: f64,
    /// SMA period actually used (shorter than `sma_weeks` for young tickers).
    pub period_used: usize,
    pub sma_points: Vec<SmaPoint>,
    pub slopes: Vec<SlopePoint>,
    pub slope_direction: SlopeDirection,
    /// Stored negation of the lookback check; true also when no slope history exists.
    pub slope_ever_negative: bool,
    pub buy: BuyEvaluation,
    pub sell: SellEvaluation,
    pub signal: SignalType,
}

impl StockEvaluation {
    /// Current SMA, `None` when history was insufficient.
    pub fn sma(&self) -> Option<f64> {
        (self.buy.sma != 0.0).then_some(self.buy.sma)
    }

    pub fn percent_distance(&self) -> f64 {
        self.buy.percent_distance
    }

    /// The most recent `n` SMA points, oldest first.
    pub fn recent_sma(&self, n: usize) -> &[SmaPoint] {
        let start = self.sma_points.len().saturating_sub(n);
        &self.sma_points[start..]
    }
}

pub fn evaluate_stock(
    series: &[WeeklyClose],
    current_price: f64,
    params: &StrategyParams,
) -> Result<StockEvaluation, SignalError> {
    params.validate()?;

    let flexible = calculate_flexible_sma(series, params.sma_weeks, params.min_sma_weeks)?;
    let slopes = calculate_rolling_slope(&flexible.points, params.slope_rolling_weeks)?;

    let buy = evaluate_buy(current_price, &flexible.points, &slopes, &params.buy_criteria())?;
    let sell = evaluate_sell(current_price, &flexible.points, &params.sell_criteria())?;
    let signal = classify(&buy, &sell);

    let slope_ever_negative = !has_never_had_negative_slope(&slopes, params.slope_history_weeks)?;
    let slope_direction = current_slope_direction(&slopes);

    Ok(StockEvaluation {
        current_price,
        period_used: flexible.period_used,
        sma_points: flexible.points,
        slopes,
        slope_direction,
        slope_ever_negative,
        buy,
        sell,
        signal,
    })
}

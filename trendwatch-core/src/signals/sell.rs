//! Sell rules.
//!
//! SELL when either holds:
//! 1. price at least `high_threshold_pct` above the SMA
//! 2. price at least `low_threshold_pct` below the SMA

use crate::domain::{SellEvaluation, SmaPoint};
use crate::error::{check_price, SignalError};
use crate::indicators::current_sma;

use super::params::SellCriteria;
use super::percent_distance;

pub fn evaluate_sell(
    current_price: f64,
    sma_points: &[SmaPoint],
    criteria: &SellCriteria,
) -> Result<SellEvaluation, SignalError> {
    check_price(current_price)?;

    let sma = match current_sma(sma_points) {
        Some(sma) if sma != 0.0 => sma,
        _ => return Ok(SellEvaluation::no_signal(current_price)),
    };

    let percent_distance = percent_distance(current_price, sma);
    let is_far_above = percent_distance >= criteria.high_threshold_pct;
    let is_far_below = percent_distance <= -criteria.low_threshold_pct;

    Ok(SellEvaluation {
        has_sell_signal: is_far_above || is_far_below,
        is_far_above,
        is_far_below,
        current_price,
        sma,
        percent_distance,
    })
}

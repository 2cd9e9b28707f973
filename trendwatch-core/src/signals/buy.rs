//! Buy rules.
//!
//! BUY when all three hold:
//! 1. price above the current SMA
//! 2. no negative slope within the lookback window
//! 3. price no more than `max_above_pct` above the SMA

use crate::domain::{BuyEvaluation, SlopePoint, SmaPoint};
use crate::error::{check_price, SignalError};
use crate::indicators::{current_sma, has_never_had_negative_slope};

use super::params::BuyCriteria;
use super::percent_distance;

pub fn evaluate_buy(
    current_price: f64,
    sma_points: &[SmaPoint],
    slopes: &[SlopePoint],
    criteria: &BuyCriteria,
) -> Result<BuyEvaluation, SignalError> {
    check_price(current_price)?;

    let sma = match current_sma(sma_points) {
        Some(sma) if sma != 0.0 => sma,
        _ => return Ok(BuyEvaluation::no_signal(current_price)),
    };

    let percent_distance = percent_distance(current_price, sma);
    let price_above_sma = current_price > sma;
    let slope_never_negative = has_never_had_negative_slope(slopes, criteria.slope_lookback_weeks)?;
    let within_threshold = price_above_sma && percent_distance <= criteria.max_above_pct;

    Ok(BuyEvaluation {
        meets_all_criteria: price_above_sma && slope_never_negative && within_threshold,
        price_above_sma,
        slope_never_negative,
        within_threshold,
        current_price,
        sma,
        percent_distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_sma_points};
    use chrono::NaiveDate;

    fn sma_at(value: f64) -> Vec<SmaPoint> {
        make_sma_points(&[value])
    }

    fn slopes(values: &[f64]) -> Vec<SlopePoint> {
        let base = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &slope)| SlopePoint {
                week_ending: base + chrono::Duration::weeks(i as i64),
                slope,
            })
            .collect()
    }

    fn positive_slopes() -> Vec<SlopePoint> {
        slopes(&[0.5; 400])
    }

    fn criteria() -> BuyCriteria {
        BuyCriteria {
            max_above_pct: 8.0,
            slope_lookback_weeks: 364,
        }
    }

    #[test]
    fn all_conditions_met() {
        let eval = evaluate_buy(103.0, &sma_at(100.0), &positive_slopes(), &criteria()).unwrap();
        assert!(eval.meets_all_criteria);
        assert!(eval.price_above_sma);
        assert!(eval.slope_never_negative);
        assert!(eval.within_threshold);
        assert_approx(eval.percent_distance, 3.0, 1e-9);
        assert_eq!(eval.sma, 100.0);
    }

    #[test]
    fn exactly_at_ceiling_is_within() {
        let eval = evaluate_buy(108.0, &sma_at(100.0), &positive_slopes(), &criteria()).unwrap();
        assert!(eval.within_threshold);
        assert!(eval.meets_all_criteria);
    }

    #[test]
    fn one_cent_above_ceiling_is_not() {
        let eval = evaluate_buy(108.01, &sma_at(100.0), &positive_slopes(), &criteria()).unwrap();
        assert!(eval.price_above_sma);
        assert!(!eval.within_threshold);
        assert!(!eval.meets_all_criteria);
    }

    #[test]
    fn below_sma_never_buys() {
        let eval = evaluate_buy(95.0, &sma_at(100.0), &positive_slopes(), &criteria()).unwrap();
        assert!(!eval.price_above_sma);
        assert!(!eval.within_threshold);
        assert!(!eval.meets_all_criteria);
        assert_approx(eval.percent_distance, -5.0, 1e-9);
    }

    #[test]
    fn at_sma_is_not_above() {
        let eval = evaluate_buy(100.0, &sma_at(100.0), &positive_slopes(), &criteria()).unwrap();
        assert!(!eval.price_above_sma);
        assert!(!eval.meets_all_criteria);
    }

    #[test]
    fn negative_slope_in_window_blocks_buy() {
        let mut values = vec![0.5; 400];
        values[380] = -0.1;
        let eval = evaluate_buy(103.0, &sma_at(100.0), &slopes(&values), &criteria()).unwrap();
        assert!(!eval.slope_never_negative);
        assert!(!eval.meets_all_criteria);
        assert!(eval.within_threshold);
    }

    #[test]
    fn no_slope_history_blocks_buy() {
        let eval = evaluate_buy(103.0, &sma_at(100.0), &[], &criteria()).unwrap();
        assert!(!eval.slope_never_negative);
        assert!(!eval.meets_all_criteria);
    }

    #[test]
    fn missing_sma_is_no_signal() {
        let eval = evaluate_buy(100.0, &[], &positive_slopes(), &criteria()).unwrap();
        assert_eq!(eval, BuyEvaluation::no_signal(100.0));
    }

    #[test]
    fn zero_sma_is_no_signal() {
        let eval = evaluate_buy(100.0, &sma_at(0.0), &positive_slopes(), &criteria()).unwrap();
        assert!(!eval.meets_all_criteria);
        assert_eq!(eval.sma, 0.0);
        assert_eq!(eval.percent_distance, 0.0);
    }

    #[test]
    fn invalid_price_rejected() {
        for price in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                evaluate_buy(price, &sma_at(100.0), &positive_slopes(), &criteria()),
                Err(SignalError::InvalidPrice(_))
            ));
        }
    }

    #[test]
    fn repeated_calls_are_identical() {
        let sma = sma_at(97.3);
        let s = positive_slopes();
        let a = evaluate_buy(101.7, &sma, &s, &criteria()).unwrap();
        let b = evaluate_buy(101.7, &sma, &s, &criteria()).unwrap();
        assert_eq!(a.percent_distance.to_bits(), b.percent_distance.to_bits());
        assert_eq!(a, b);
    }
}

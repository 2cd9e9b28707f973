//! Evaluation fingerprinting.
//!
//! A run of the daily job is reproducible from its inputs: the strategy
//! parameters and each ticker's weekly series. Both are hashed with BLAKE3
//! so reports can state exactly what produced a signal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::WeeklyClose;
use crate::signals::StrategyParams;

/// Hex BLAKE3 hash of a weekly series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesHash(pub String);

/// Hex BLAKE3 hash of a parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamsHash(pub String);

impl fmt::Display for SeriesHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ParamsHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash dates and closes in order. Closes are hashed by bit pattern.
pub fn series_hash(series: &[WeeklyClose]) -> SeriesHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(series.len() as u64).to_le_bytes());
    for week in series {
        hasher.update(week.week_ending.to_string().as_bytes());
        hasher.update(&week.close.to_bits().to_le_bytes());
    }
    SeriesHash(hasher.finalize().to_hex().to_string())
}

/// Hash every parameter in declaration order.
pub fn params_hash(params: &StrategyParams) -> ParamsHash {
    let mut hasher = blake3::Hasher::new();
    for window in [
        params.sma_weeks,
        params.min_sma_weeks,
        params.slope_rolling_weeks,
        params.slope_history_weeks,
    ] {
        hasher.update(&(window as u64).to_le_bytes());
    }
    for pct in [
        params.buy_max_above_pct,
        params.sell_above_pct,
        params.sell_below_pct,
    ] {
        hasher.update(&pct.to_bits().to_le_bytes());
    }
    ParamsHash(hasher.finalize().to_hex().to_string())
}

/// Inputs behind one ticker's evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationFingerprint {
    pub ticker: String,
    pub params: ParamsHash,
    pub series: SeriesHash,
}

impl EvaluationFingerprint {
    pub fn new(ticker: &str, params: &StrategyParams, series: &[WeeklyClose]) -> Self {
        Self {
            ticker: ticker.to_string(),
            params: params_hash(params),
            series: series_hash(series),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_series;

    #[test]
    fn series_hash_is_deterministic() {
        let a = make_series(&[1.0, 2.0, 3.0]);
        assert_eq!(series_hash(&a), series_hash(&a.clone()));
        assert_eq!(series_hash(&a).0.len(), 64);
    }

    #[test]
    fn series_hash_sees_a_single_close_change() {
        let a = make_series(&[1.0, 2.0, 3.0]);
        let b = make_series(&[1.0, 2.0, 3.0000001]);
        assert_ne!(series_hash(&a), series_hash(&b));
    }

    #[test]
    fn params_hash_changes_with_any_threshold() {
        let base = StrategyParams::default();
        let mut tweaked = base.clone();
        tweaked.sell_below_pct = 5.0;
        assert_eq!(params_hash(&base), params_hash(&StrategyParams::default()));
        assert_ne!(params_hash(&base), params_hash(&tweaked));
    }
}

//! Signal rules and classification.

pub mod buy;
pub mod classify;
pub mod params;
pub mod pipeline;
pub mod sell;

pub use buy::evaluate_buy;
pub use classify::classify;
pub use params::{BuyCriteria, SellCriteria, StrategyParams};
pub use pipeline::{evaluate_stock, StockEvaluation};
pub use sell::evaluate_sell;

/// Signed distance of `price` from `sma`, in percent of `sma`.
///
/// Callers guard against a zero SMA.
pub fn percent_distance(price: f64, sma: f64) -> f64 {
    (price - sma) / sma * 100.0
}

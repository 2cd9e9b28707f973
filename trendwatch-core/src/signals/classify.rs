//! Resolve buy and sell evaluations into a single signal type.

use crate::domain::{BuyEvaluation, SellEvaluation, SignalType};

/// Precedence: BUY, then SELL_HIGH, then SELL_LOW, otherwise NEUTRAL.
pub fn classify(buy: &BuyEvaluation, sell: &SellEvaluation) -> SignalType {
    if buy.meets_all_criteria {
        SignalType::Buy
    } else if sell.is_far_above {
        SignalType::SellHigh
    } else if sell.is_far_below {
        SignalType::SellLow
    } else {
        SignalType::Neutral
    }
}

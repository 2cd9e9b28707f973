//! TrendWatch Core: the 200-week moving-average signal engine.
//!
//! This crate holds everything that does not need a clock, a config file or
//! a persistent store:
//! - Domain types (weekly closes, SMA and slope points, evaluations, signal types)
//! - Indicators: fixed and flexible-window SMA, rolling SMA slope
//! - Buy and sell rules and the signal classifier
//! - Price providers (Yahoo Finance, Alpha Vantage, CSV, synthetic)
//! - BLAKE3 fingerprints of evaluation inputs

pub mod data;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod indicators;
pub mod signals;

pub use domain::{
    BuyEvaluation, SellEvaluation, SignalType, SlopeDirection, SlopePoint, SmaPoint, WeeklyClose,
};
pub use error::SignalError;
pub use signals::{evaluate_stock, StockEvaluation, StrategyParams};

//! Price data: provider traits, HTTP sources, CSV import and synthetic data.

pub mod alpha_vantage;
pub mod circuit_breaker;
pub mod csv_io;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageProvider;
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use csv_io::{read_weekly_csv, save_weekly_csv, write_weekly_csv, CsvProvider};
pub use provider::{
    DataError, DataSource, FallbackProvider, PriceHistoryProvider, Quote, QuoteProvider,
};
pub use synthetic::{synthetic_weekly_series, SyntheticProvider};
pub use yahoo::YahooProvider;

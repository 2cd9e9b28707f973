//! Price provider traits and structured error types.
//!
//! Two collaborators feed the engine: a weekly-history provider and a live
//! quote provider. Both are traits so the daily job can be driven by Yahoo,
//! Alpha Vantage, CSV files or test doubles.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::WeeklyClose;

/// Structured error types for data operations.
///
/// These are designed to be displayable in both CLI and log contexts.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("api key missing: set {0}")]
    MissingApiKey(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("csv error: {0}")]
    Csv(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("no data for '{symbol}' from any source")]
    AllSourcesFailed { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

impl From<csv::Error> for DataError {
    fn from(e: csv::Error) -> Self {
        DataError::Csv(e.to_string())
    }
}

/// Live quote for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub display_name: String,
}

/// Where a weekly series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    AlphaVantage,
    CsvImport,
    Synthetic,
}

/// Weekly close history source.
pub trait PriceHistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Weekly closes for `ticker` over roughly `years_back` years, oldest first.
    fn fetch_weekly(&self, ticker: &str, years_back: u32) -> Result<Vec<WeeklyClose>, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

/// Live quote source.
pub trait QuoteProvider: Send + Sync {
    fn fetch_quote(&self, ticker: &str) -> Result<Quote, DataError>;

    /// True when quotes are read back from the stored weekly history rather
    /// than a live market. Such a quote must not be written as a new week.
    fn quotes_from_history(&self) -> bool {
        false
    }
}

impl<T: PriceHistoryProvider + ?Sized> PriceHistoryProvider for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_weekly(&self, ticker: &str, years_back: u32) -> Result<Vec<WeeklyClose>, DataError> {
        (**self).fetch_weekly(ticker, years_back)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

impl<T: QuoteProvider + ?Sized> QuoteProvider for Box<T> {
    fn fetch_quote(&self, ticker: &str) -> Result<Quote, DataError> {
        (**self).fetch_quote(ticker)
    }

    fn quotes_from_history(&self) -> bool {
        (**self).quotes_from_history()
    }
}

/// Tries `primary`, then `secondary` when the primary fails or returns nothing.
pub struct FallbackProvider<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> FallbackProvider<P, S>
where
    P: PriceHistoryProvider,
    S: PriceHistoryProvider,
{
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P, S> PriceHistoryProvider for FallbackProvider<P, S>
where
    P: PriceHistoryProvider,
    S: PriceHistoryProvider,
{
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn fetch_weekly(&self, ticker: &str, years_back: u32) -> Result<Vec<WeeklyClose>, DataError> {
        if self.primary.is_available() {
            match self.primary.fetch_weekly(ticker, years_back) {
                Ok(series) if !series.is_empty() => return Ok(series),
                Ok(_) => warn!(
                    ticker,
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    "primary returned no data, trying fallback"
                ),
                Err(e) => warn!(
                    ticker,
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "primary failed, trying fallback"
                ),
            }
        }

        match self.secondary.fetch_weekly(ticker, years_back) {
            Ok(series) if !series.is_empty() => Ok(series),
            Ok(_) => Err(DataError::AllSourcesFailed {
                symbol: ticker.to_string(),
            }),
            Err(e) => {
                warn!(ticker, secondary = self.secondary.name(), error = %e, "fallback failed");
                Err(DataError::AllSourcesFailed {
                    symbol: ticker.to_string(),
                })
            }
        }
    }

    fn is_available(&self) -> bool {
        self.primary.is_available() || self.secondary.is_available()
    }
}

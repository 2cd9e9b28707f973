//! Yahoo Finance data provider.
//!
//! Weekly closes come from the v8 chart API with `interval=1wk`; live quotes
//! from the same endpoint with `range=1d`. Handles retries with exponential
//! backoff, response parsing, and the shared circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.
//! Alpha Vantage and CSV import are the fallbacks when Yahoo is unavailable.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, PriceHistoryProvider, Quote, QuoteProvider};
use crate::domain::{normalize_series, week_ending_for, WeeklyClose};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart/";
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)";
const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    short_name: Option<String>,
    long_name: Option<String>,
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

/// Yahoo Finance provider for weekly history and live quotes.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(ticker: &str, query: &[(&str, String)]) -> Result<Url, DataError> {
        let mut url = Url::parse(CHART_BASE)
            .map_err(|e| DataError::Other(format!("bad chart base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DataError::Other("chart base url cannot take path segments".into()))?
            .pop_if_empty()
            .push(ticker);
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    /// Weekly chart URL covering `years_back` years up to `now`.
    fn weekly_url(ticker: &str, years_back: u32, now: DateTime<Utc>) -> Result<Url, DataError> {
        let period2 = now.timestamp();
        let period1 = period2 - (years_back as f64 * SECONDS_PER_YEAR) as i64;
        Self::chart_url(
            ticker,
            &[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1wk".to_string()),
                ("events", "history".to_string()),
            ],
        )
    }

    fn quote_url(ticker: &str) -> Result<Url, DataError> {
        Self::chart_url(
            ticker,
            &[("range", "1d".to_string()), ("interval", "1d".to_string())],
        )
    }

    fn first_result(symbol: &str, resp: ChartResponse) -> Result<ChartData, DataError> {
        let results = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        results
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))
    }

    /// Parse a weekly chart response into week-ending closes.
    ///
    /// Bars with a null close are skipped. Dates are moved to the Friday of
    /// their week so they line up with the live-price week the daily job writes.
    fn parse_weekly(symbol: &str, resp: ChartResponse) -> Result<Vec<WeeklyClose>, DataError> {
        let data = Self::first_result(symbol, resp)?;

        let timestamps = data
            .timestamp
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut weeks = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };
            if !(close.is_finite() && close > 0.0) {
                continue;
            }
            let date = DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
            weeks.push(WeeklyClose::new(week_ending_for(date), close));
        }

        if weeks.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        Ok(normalize_series(weeks))
    }

    fn parse_quote(symbol: &str, resp: ChartResponse) -> Result<Quote, DataError> {
        let data = Self::first_result(symbol, resp)?;
        let meta = data.meta;
        let price = meta
            .regular_market_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("no market price for {symbol}")))?;

        let display_name = meta
            .short_name
            .or(meta.long_name)
            .or(meta.symbol)
            .unwrap_or_else(|| symbol.to_string());

        Ok(Quote {
            price,
            display_name,
        })
    }

    /// Execute a single chart request with retry and circuit breaker logic.
    fn get_chart(&self, symbol: &str, url: &Url) -> Result<ChartResponse, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying chart request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(url.clone()).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        warn!(symbol, retry_after, "rate limited by Yahoo Finance");
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;
                    self.circuit_breaker.record_success();
                    return Ok(chart);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl PriceHistoryProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_weekly(&self, ticker: &str, years_back: u32) -> Result<Vec<WeeklyClose>, DataError> {
        let url = Self::weekly_url(ticker, years_back, Utc::now())?;
        let chart = self.get_chart(ticker, &url)?;
        let weeks = Self::parse_weekly(ticker, chart)?;
        debug!(ticker, weeks = weeks.len(), "fetched weekly history");
        Ok(weeks)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

impl QuoteProvider for YahooProvider {
    fn fetch_quote(&self, ticker: &str) -> Result<Quote, DataError> {
        let url = Self::quote_url(ticker)?;
        let chart = self.get_chart(ticker, &url)?;
        Self::parse_quote(ticker, chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn chart(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    // 2024-01-01 (Mon), 2024-01-08 (Mon), 2024-01-15 (Mon)
    const WEEKLY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"regularMarketPrice": 187.5, "shortName": "Apple Inc.", "symbol": "AAPL"},
                "timestamp": [1704067200, 1704672000, 1705276800],
                "indicators": {"quote": [{"close": [185.0, null, 187.5]}]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_weekly_closes_onto_fridays() {
        let weeks = YahooProvider::parse_weekly("AAPL", chart(WEEKLY)).unwrap();
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].week_ending, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(weeks[0].close, 185.0);
        assert_eq!(weeks[1].week_ending, NaiveDate::from_ymd_opt(2024, 1, 19).unwrap());
    }

    #[test]
    fn parses_quote_with_name_fallback() {
        let quote = YahooProvider::parse_quote("AAPL", chart(WEEKLY)).unwrap();
        assert_eq!(quote.price, 187.5);
        assert_eq!(quote.display_name, "Apple Inc.");

        let bare = r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 10.0},
            "indicators": {"quote": []}}], "error": null}}"#;
        let quote = YahooProvider::parse_quote("XYZ", chart(bare)).unwrap();
        assert_eq!(quote.display_name, "XYZ");
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let resp = r#"{"chart": {"result": null,
            "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        assert!(matches!(
            YahooProvider::parse_weekly("NOPE", chart(resp)),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn all_null_closes_is_symbol_not_found() {
        let resp = r#"{"chart": {"result": [{"meta": {},
            "timestamp": [1704067200], "indicators": {"quote": [{"close": [null]}]}}], "error": null}}"#;
        assert!(matches!(
            YahooProvider::parse_weekly("X", chart(resp)),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn urls_encode_ticker_and_interval() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let url = YahooProvider::weekly_url("^GSPC", 10, now).unwrap();
        let s = url.as_str();
        assert!(s.starts_with("https://query1.finance.yahoo.com/v8/finance/chart/"));
        assert!(s.contains("GSPC?period1="));
        assert!(s.contains("interval=1wk"));
        assert!(s.contains("period2=1700000000"));

        let url = YahooProvider::quote_url("BRK-B").unwrap();
        assert!(url.as_str().ends_with("/chart/BRK-B?range=1d&interval=1d"));
    }
}

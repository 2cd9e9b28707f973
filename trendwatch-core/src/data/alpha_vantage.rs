//! Alpha Vantage weekly-adjusted history, used as the fallback source.
//!
//! The free tier allows a handful of requests per minute. A throttled
//! response arrives as HTTP 200 with a `Note` field instead of data.

use super::provider::{DataError, PriceHistoryProvider};
use crate::domain::{normalize_series, week_ending_for, WeeklyClose};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const QUERY_BASE: &str = "https://www.alphavantage.co/query";

/// Default environment variable holding the API key.
pub const DEFAULT_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";

#[derive(Debug, Deserialize)]
struct WeeklyAdjustedResponse {
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Weekly Adjusted Time Series")]
    series: Option<BTreeMap<String, WeeklyEntry>>,
}

#[derive(Debug, Deserialize)]
struct WeeklyEntry {
    #[serde(rename = "5. adjusted close")]
    adjusted_close: String,
}

pub struct AlphaVantageProvider {
    client: reqwest::blocking::Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Build a provider from the key stored in `var`.
    pub fn from_env(var: &str) -> Result<Self, DataError> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Self::new(key.trim()),
            _ => Err(DataError::MissingApiKey(var.to_string())),
        }
    }

    fn weekly_url(&self, ticker: &str) -> Result<Url, DataError> {
        Url::parse_with_params(
            QUERY_BASE,
            &[
                ("function", "TIME_SERIES_WEEKLY_ADJUSTED"),
                ("symbol", ticker),
                ("outputsize", "full"),
                ("apikey", self.api_key.as_str()),
            ],
        )
        .map_err(|e| DataError::Other(format!("bad query url: {e}")))
    }

    /// Parse a response body, keeping weeks on or after `since`.
    fn parse_weekly(
        symbol: &str,
        body: &str,
        since: NaiveDate,
    ) -> Result<Vec<WeeklyClose>, DataError> {
        let resp: WeeklyAdjustedResponse = serde_json::from_str(body)
            .map_err(|e| DataError::ResponseFormatChanged(format!("alpha vantage: {e}")))?;

        if resp.note.is_some() || resp.information.is_some() {
            return Err(DataError::RateLimited {
                retry_after_secs: 60,
            });
        }
        if let Some(msg) = resp.error_message {
            debug!(symbol, %msg, "alpha vantage rejected symbol");
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let series = resp.series.ok_or_else(|| {
            DataError::ResponseFormatChanged("no weekly adjusted series in response".into())
        })?;

        let mut weeks = Vec::with_capacity(series.len());
        for (date, entry) in series {
            let traded = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| DataError::ResponseFormatChanged(format!("bad date '{date}': {e}")))?;
            if traded < since {
                continue;
            }
            let close: f64 = entry.adjusted_close.parse().map_err(|e| {
                DataError::ResponseFormatChanged(format!("bad close on {date}: {e}"))
            })?;
            // Bars are dated by their last trading day: mid-week for the
            // in-progress week, Thursday before a Friday holiday.
            if close.is_finite() && close > 0.0 {
                weeks.push(WeeklyClose::new(week_ending_for(traded), close));
            }
        }

        if weeks.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(normalize_series(weeks))
    }
}

impl PriceHistoryProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn fetch_weekly(&self, ticker: &str, years_back: u32) -> Result<Vec<WeeklyClose>, DataError> {
        let url = self.weekly_url(ticker)?;
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} from alpha vantage")));
        }
        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let since = Utc::now().date_naive() - ChronoDuration::days(i64::from(years_back) * 366);
        Self::parse_weekly(ticker, &body, since)
    }
}

//! Watchlist configuration loaded from TOML.
//!
//! A config names the stocks to watch, who follows them, where state and
//! reports go, and optionally overrides strategy parameters.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use trendwatch_core::{SignalError, StrategyParams};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid strategy parameters: {0}")]
    Strategy(#[from] SignalError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which provider serves weekly history and quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Years of weekly history requested per ticker.
    pub backfill_years: u32,
    pub provider: ProviderKind,
    pub csv_dir: PathBuf,
    /// Environment variable holding an Alpha Vantage key. When the variable
    /// is set, Alpha Vantage backs up Yahoo for weekly history.
    pub alpha_vantage_key_env: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            backfill_years: 11,
            provider: ProviderKind::Yahoo,
            csv_dir: PathBuf::from("data"),
            alpha_vantage_key_env: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub ledger_path: PathBuf,
    pub outbox_path: PathBuf,
    pub report_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("state/ledger.json"),
            outbox_path: PathBuf::from("state/outbox.jsonl"),
            report_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    pub ticker: String,
    #[serde(default)]
    pub owned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub name: String,
    pub email: String,
    /// Delivery address used instead of `email` when set.
    #[serde(default)]
    pub notification_email: Option<String>,
    /// A disabled subscriber receives nothing, summaries included.
    #[serde(default = "enabled")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub daily_digest: bool,
}

fn enabled() -> bool {
    true
}

impl Subscriber {
    pub fn tracks(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t == ticker)
    }

    /// Address notices are sent to.
    pub fn delivery_email(&self) -> &str {
        self.notification_email.as_deref().unwrap_or(&self.email)
    }
}

/// Complete watchlist configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub strategy: StrategyParams,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub stocks: Vec<StockEntry>,
    #[serde(default)]
    pub subscribers: Vec<Subscriber>,
}

impl WatchConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    ///
    /// Tickers are upper-cased, both on the watchlist and in subscriptions.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: WatchConfig = toml::from_str(content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        for stock in &mut self.stocks {
            stock.ticker = stock.ticker.trim().to_uppercase();
        }
        for sub in &mut self.subscribers {
            for ticker in &mut sub.tickers {
                *ticker = ticker.trim().to_uppercase();
            }
            if sub.notification_email.as_deref().is_some_and(|e| e.trim().is_empty()) {
                sub.notification_email = None;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;

        if self.data.backfill_years == 0 {
            return Err(ConfigError::Invalid("backfill_years must be at least 1".into()));
        }
        if self.stocks.is_empty() {
            return Err(ConfigError::Invalid("watchlist has no stocks".into()));
        }

        let mut seen = HashSet::new();
        for stock in &self.stocks {
            if stock.ticker.is_empty() {
                return Err(ConfigError::Invalid("empty ticker on watchlist".into()));
            }
            if !seen.insert(stock.ticker.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate ticker on watchlist: {}",
                    stock.ticker
                )));
            }
        }

        for sub in &self.subscribers {
            if let Some(unknown) = sub.tickers.iter().find(|t| !seen.contains(t.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "subscriber {} tracks {unknown}, which is not on the watchlist",
                    sub.name
                )));
            }
        }
        Ok(())
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.stocks.iter().map(|s| s.ticker.as_str()).collect()
    }
}

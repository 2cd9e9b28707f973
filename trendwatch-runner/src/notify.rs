//! Notification planning and dispatch.
//!
//! Per enabled subscriber, and only for tickers they track:
//! - changed BUY signals become a buy alert, changed SELL_HIGH / SELL_LOW
//!   signals a sell alert, each signal id at most once;
//! - with `daily_digest`, every change of this run grouped by signal type;
//! - on every run, a market summary of all tracked stocks for the
//!   `MarketTrigger`, with this run's changes listed separately.
//!
//! Delivery goes through `NotificationDispatcher`. `JsonlOutbox` appends one
//! JSON object per line, so partial writes never corrupt earlier notices.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use trendwatch_core::domain::SignalType;

use crate::config::Subscriber;
use crate::ledger::SignalLedger;

/// Market session a run reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTrigger {
    MarketOpen,
    #[default]
    MarketClose,
}

impl MarketTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketTrigger::MarketOpen => "market_open",
            MarketTrigger::MarketClose => "market_close",
        }
    }

    /// Title used in summary subjects.
    pub fn label(self) -> &'static str {
        match self {
            MarketTrigger::MarketOpen => "Market Open",
            MarketTrigger::MarketClose => "Market Close",
        }
    }
}

impl fmt::Display for MarketTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market_open" | "open" => Ok(MarketTrigger::MarketOpen),
            "market_close" | "close" => Ok(MarketTrigger::MarketClose),
            other => Err(format!(
                "unknown trigger '{other}' (expected market_open or market_close)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    BuyAlert,
    SellAlert,
    DailyDigest,
    MarketSummary,
}

/// One stock line inside a notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockNotice {
    /// Set for signals that changed in this run.
    pub signal_id: Option<String>,
    pub ticker: String,
    pub display_name: String,
    pub signal_type: SignalType,
    pub current_price: f64,
    pub sma: Option<f64>,
    pub percent_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub subscriber: String,
    pub email: String,
    pub subject: String,
    pub stocks: Vec<StockNotice>,
    /// Market summaries only: signals that changed in this run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<StockNotice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<MarketTrigger>,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    fn new(
        kind: NoticeKind,
        sub: &Subscriber,
        subject: String,
        stocks: Vec<StockNotice>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            subscriber: sub.name.clone(),
            email: sub.delivery_email().to_string(),
            subject,
            stocks,
            changes: Vec::new(),
            trigger: None,
            created_at: now,
        }
    }

    /// Signal ids this notice reports as new.
    pub fn signal_ids(&self) -> impl Iterator<Item = &str> {
        self.stocks.iter().filter_map(|s| s.signal_id.as_deref())
    }

    /// Alerts count toward deduplication; digests and summaries do not.
    pub fn is_alert(&self) -> bool {
        matches!(self.kind, NoticeKind::BuyAlert | NoticeKind::SellAlert)
    }
}

fn ticker_list(stocks: &[StockNotice]) -> String {
    stocks
        .iter()
        .map(|s| s.ticker.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn digest_subject(stocks: &[StockNotice]) -> String {
    let count = |pred: fn(SignalType) -> bool| stocks.iter().filter(|s| pred(s.signal_type)).count();
    format!(
        "Daily digest: {} BUY, {} SELL, {} NEUTRAL",
        count(|t| t == SignalType::Buy),
        count(SignalType::is_sell),
        count(|t| t == SignalType::Neutral),
    )
}

fn type_rank(signal_type: SignalType) -> usize {
    SignalType::ALL
        .iter()
        .position(|t| *t == signal_type)
        .unwrap_or(SignalType::ALL.len())
}

/// Stocks `sub` tracks, grouped by signal type, then by ticker.
fn tracked_by_type(stocks: &[StockNotice], sub: &Subscriber) -> Vec<StockNotice> {
    let mut tracked: Vec<StockNotice> = stocks
        .iter()
        .filter(|s| sub.tracks(&s.ticker))
        .cloned()
        .collect();
    tracked.sort_by(|a, b| {
        type_rank(a.signal_type)
            .cmp(&type_rank(b.signal_type))
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    tracked
}

/// Build the notices for one run.
///
/// `changed` holds stocks whose signal changed in this run (with ids);
/// `summaries` holds every successfully processed stock.
pub fn plan_notifications(
    changed: &[StockNotice],
    summaries: &[StockNotice],
    subscribers: &[Subscriber],
    ledger: &SignalLedger,
    trigger: MarketTrigger,
    now: DateTime<Utc>,
) -> Vec<Notice> {
    let mut notices = Vec::new();

    for sub in subscribers.iter().filter(|s| s.notifications_enabled) {
        let fresh = |pred: fn(SignalType) -> bool| -> Vec<StockNotice> {
            changed
                .iter()
                .filter(|s| pred(s.signal_type) && sub.tracks(&s.ticker))
                .filter(|s| {
                    s.signal_id
                        .as_deref()
                        .map_or(true, |id| !ledger.was_notified(&sub.name, id))
                })
                .cloned()
                .collect()
        };

        let buys = fresh(|t| t == SignalType::Buy);
        if !buys.is_empty() {
            let subject = format!("BUY Alert: {}", ticker_list(&buys));
            notices.push(Notice::new(NoticeKind::BuyAlert, sub, subject, buys, now));
        }

        let sells = fresh(SignalType::is_sell);
        if !sells.is_empty() {
            let subject = format!("SELL Alert: {}", ticker_list(&sells));
            notices.push(Notice::new(NoticeKind::SellAlert, sub, subject, sells, now));
        }

        let changes = tracked_by_type(changed, sub);
        if sub.daily_digest && !changes.is_empty() {
            let subject = digest_subject(&changes);
            notices.push(Notice::new(NoticeKind::DailyDigest, sub, subject, changes.clone(), now));
        }

        let tracked = tracked_by_type(summaries, sub);
        if !tracked.is_empty() {
            let subject = format!(
                "{} Summary: {} stocks, {}",
                trigger.label(),
                tracked.len(),
                now.date_naive()
            );
            let mut summary = Notice::new(NoticeKind::MarketSummary, sub, subject, tracked, now);
            summary.changes = changes;
            summary.trigger = Some(trigger);
            notices.push(summary);
        }
    }

    notices
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("outbox I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("encode notice: {0}")]
    Json(#[from] serde_json::Error),
}

/// Delivery channel for notices.
pub trait NotificationDispatcher: Send + Sync {
    fn name(&self) -> &str;

    fn dispatch(&self, notice: &Notice) -> Result<(), DispatchError>;
}

/// Logs each notice and delivers nothing. Used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn name(&self) -> &str {
        "log"
    }

    fn dispatch(&self, notice: &Notice) -> Result<(), DispatchError> {
        info!(
            subscriber = %notice.subscriber,
            kind = ?notice.kind,
            stocks = notice.stocks.len(),
            subject = %notice.subject,
            "notification"
        );
        Ok(())
    }
}

/// Append-only JSONL outbox.
pub struct JsonlOutbox {
    path: PathBuf,
}

impl JsonlOutbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every notice in the outbox. Malformed lines are skipped.
    pub fn read_all(&self) -> io::Result<Vec<Notice>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut notices = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Notice>(&line) {
                Ok(notice) => notices.push(notice),
                Err(e) => warn!(line = n + 1, error = %e, "skipping malformed outbox line"),
            }
        }
        Ok(notices)
    }
}

impl NotificationDispatcher for JsonlOutbox {
    fn name(&self) -> &str {
        "jsonl_outbox"
    }

    fn dispatch(&self, notice: &Notice) -> Result<(), DispatchError> {
        let json = serde_json::to_string(notice)?;
        let io_err = |source: io::Error| DispatchError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        writeln!(file, "{json}").map_err(io_err)?;
        file.flush().map_err(io_err)
    }
}

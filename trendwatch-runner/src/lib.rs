//! TrendWatch Runner: the daily watchlist job around `trendwatch-core`.
//!
//! This crate provides:
//! - TOML watchlist configuration
//! - Week-ending calendar and current-week upsert
//! - The daily job with per-stock failure isolation
//! - Signal ledger (active-signal transitions, delivered-alert record)
//! - Notification planning (alerts, digests, market summaries) and dispatch
//! - JSON/CSV job reports

pub mod calendar;
pub mod config;
pub mod job;
pub mod ledger;
pub mod notify;
pub mod report;

pub use calendar::{current_week_ending, upsert_week};
pub use config::{ConfigError, DataConfig, OutputConfig, ProviderKind, StockEntry, Subscriber, WatchConfig};
pub use job::{persist_run, run_daily_job, JobError, StockError};
pub use ledger::{LedgerError, SignalChange, SignalLedger, SignalRecord, StockSnapshot};
pub use notify::{
    plan_notifications, DispatchError, JsonlOutbox, LogDispatcher, MarketTrigger, Notice,
    NoticeKind, NotificationDispatcher, StockNotice,
};
pub use report::{JobReport, StockFailure, StockRow};

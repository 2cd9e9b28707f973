//! Job reports: JSON and CSV artifacts for one daily run.
//!
//! `report.json` holds the full `JobReport`; `stocks.csv` holds one row per
//! processed stock for spreadsheets. Both land in a directory named after
//! the run's start time. Persisted reports carry a `schema_version`; unknown
//! versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use trendwatch_core::domain::{SignalType, SlopeDirection};

use crate::ledger::SignalChange;
use crate::notify::MarketTrigger;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// A stock the job could not process, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockFailure {
    pub ticker: String,
    pub error: String,
}

/// Per-stock outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRow {
    pub ticker: String,
    pub display_name: String,
    pub owned: bool,
    pub signal_type: SignalType,
    pub current_price: f64,
    pub sma: Option<f64>,
    pub percent_distance: f64,
    pub period_used: usize,
    pub slope_direction: SlopeDirection,
    pub slope_ever_negative: bool,
    pub weeks: usize,
    pub series_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub schema_version: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub week_ending: NaiveDate,
    #[serde(default)]
    pub trigger: MarketTrigger,
    pub processed: Vec<String>,
    pub failures: Vec<StockFailure>,
    pub signal_changes: Vec<SignalChange>,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    #[serde(default)]
    pub market_summaries_sent: usize,
    pub rows: Vec<StockRow>,
    pub params_hash: String,
    /// BLAKE3 over the parameters and every processed input series.
    pub run_hash: String,
}

impl JobReport {
    /// One-line summary for logs and the terminal.
    pub fn summary_line(&self) -> String {
        format!(
            "{} | processed {} | failed {} | signal changes {} | notifications sent {} failed {} | summaries {} | {} ms",
            self.trigger,
            self.processed.len(),
            self.failures.len(),
            self.signal_changes.len(),
            self.notifications_sent,
            self.notifications_failed,
            self.market_summaries_sent,
            self.duration_ms,
        )
    }

    pub fn count(&self, signal_type: SignalType) -> usize {
        self.rows.iter().filter(|r| r.signal_type == signal_type).count()
    }

    /// Write `report.json` and `stocks.csv` under `{dir}/{YYYYMMDD_HHMMSS}/`.
    ///
    /// Returns the created directory.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let run_dir = dir.join(self.started_at.format("%Y%m%d_%H%M%S").to_string());
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("failed to create report dir: {}", run_dir.display()))?;

        std::fs::write(run_dir.join("report.json"), export_json(self)?)
            .context("failed to write report.json")?;
        std::fs::write(run_dir.join("stocks.csv"), export_rows_csv(&self.rows)?)
            .context("failed to write stocks.csv")?;

        Ok(run_dir)
    }
}

pub fn export_json(report: &JobReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize JobReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<JobReport> {
    let report: JobReport =
        serde_json::from_str(json).context("failed to deserialize JobReport from JSON")?;
    if report.schema_version > REPORT_SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            REPORT_SCHEMA_VERSION
        );
    }
    Ok(report)
}

/// Columns: ticker, name, owned, signal, price, sma, pct_from_sma,
/// sma_period, slope, slope_ever_negative, weeks, series_hash
pub fn export_rows_csv(rows: &[StockRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "name",
        "owned",
        "signal",
        "price",
        "sma",
        "pct_from_sma",
        "sma_period",
        "slope",
        "slope_ever_negative",
        "weeks",
        "series_hash",
    ])?;

    for r in rows {
        let slope = match r.slope_direction {
            SlopeDirection::Up => "up",
            SlopeDirection::Down => "down",
        };
        let price = format!("{:.2}", r.current_price);
        let sma = r.sma.map(|v| format!("{v:.2}")).unwrap_or_default();
        let pct = format!("{:.2}", r.percent_distance);
        let period = r.period_used.to_string();
        let weeks = r.weeks.to_string();
        wtr.write_record([
            r.ticker.as_str(),
            r.display_name.as_str(),
            if r.owned { "true" } else { "false" },
            r.signal_type.as_str(),
            price.as_str(),
            sma.as_str(),
            pct.as_str(),
            period.as_str(),
            slope,
            if r.slope_ever_negative { "true" } else { "false" },
            weeks.as_str(),
            r.series_hash.as_str(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

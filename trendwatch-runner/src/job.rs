//! The daily watchlist job.
//!
//! 1. Per stock, in parallel: quote → weekly history → current-week upsert →
//!    evaluation. A failing stock is recorded and never stops the others.
//!    Quotes read back from stored history are not upserted.
//! 2. In watchlist order: apply each signal to the ledger and refresh the
//!    stock snapshot.
//! 3. Plan and dispatch alerts, digests and the market summary for the
//!    run's `MarketTrigger`; record delivered alert ids.
//!
//! `persist_run` then saves the ledger and the report.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use trendwatch_core::data::{DataError, PriceHistoryProvider, Quote, QuoteProvider};
use trendwatch_core::fingerprint::{params_hash, EvaluationFingerprint};
use trendwatch_core::{evaluate_stock, SignalError, StockEvaluation};

use crate::calendar::{current_week_ending, upsert_week};
use crate::config::{ConfigError, StockEntry, WatchConfig};
use crate::ledger::{LedgerError, SignalContext, SignalLedger, StockSnapshot};
use crate::notify::{plan_notifications, MarketTrigger, NoticeKind, NotificationDispatcher, StockNotice};
use crate::report::{JobReport, StockFailure, StockRow, REPORT_SCHEMA_VERSION};

/// SMA points kept on each stock snapshot.
const RECENT_SMA_POINTS: usize = 10;

/// Why a single stock could not be evaluated.
#[derive(Debug, Error)]
pub enum StockError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Failures that abort the whole job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("report: {0:#}")]
    Report(#[from] anyhow::Error),
}

/// Everything computed for one stock before it touches shared state.
#[derive(Debug)]
struct ProcessedStock {
    quote: Quote,
    evaluation: StockEvaluation,
    fingerprint: EvaluationFingerprint,
    weeks: usize,
}

fn process_stock(
    stock: &StockEntry,
    config: &WatchConfig,
    history: &dyn PriceHistoryProvider,
    quotes: &dyn QuoteProvider,
    week_ending: NaiveDate,
) -> Result<ProcessedStock, StockError> {
    let ticker = stock.ticker.as_str();
    let quote = quotes.fetch_quote(ticker)?;
    let mut series = history.fetch_weekly(ticker, config.data.backfill_years)?;

    let added = !quotes.quotes_from_history() && upsert_week(&mut series, week_ending, quote.price);
    debug!(ticker, weeks = series.len(), added, %week_ending, "weekly series ready");

    let evaluation = evaluate_stock(&series, quote.price, &config.strategy)?;
    let fingerprint = EvaluationFingerprint::new(ticker, &config.strategy, &series);

    Ok(ProcessedStock {
        quote,
        evaluation,
        fingerprint,
        weeks: series.len(),
    })
}

fn run_hash(params: &str, rows: &[StockRow]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(params.as_bytes());
    for row in rows {
        hasher.update(row.ticker.as_bytes());
        hasher.update(row.series_hash.as_bytes());
        hasher.update(&row.current_price.to_bits().to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Run the job once for the moment `now`.
///
/// The ledger is updated in memory; callers persist it with `persist_run`.
pub fn run_daily_job(
    config: &WatchConfig,
    history: &dyn PriceHistoryProvider,
    quotes: &dyn QuoteProvider,
    ledger: &mut SignalLedger,
    dispatcher: &dyn NotificationDispatcher,
    trigger: MarketTrigger,
    now: DateTime<Utc>,
) -> Result<JobReport, JobError> {
    config.validate()?;
    let started = Instant::now();
    let week_ending = current_week_ending(now);
    info!(
        stocks = config.stocks.len(),
        provider = history.name(),
        %trigger,
        %week_ending,
        "daily job started"
    );

    let results: Vec<Result<ProcessedStock, StockError>> = config
        .stocks
        .par_iter()
        .map(|stock| process_stock(stock, config, history, quotes, week_ending))
        .collect();

    let mut processed = Vec::new();
    let mut failures = Vec::new();
    let mut changes = Vec::new();
    let mut changed_notices = Vec::new();
    let mut summaries = Vec::new();
    let mut rows = Vec::new();

    for (stock, result) in config.stocks.iter().zip(results) {
        let ticker = stock.ticker.as_str();
        let p = match result {
            Ok(p) => p,
            Err(e) => {
                warn!(ticker, error = %e, "stock failed");
                failures.push(StockFailure {
                    ticker: ticker.to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let eval = &p.evaluation;
        let sma = eval.sma();
        let context = SignalContext {
            price: eval.current_price,
            sma,
            percent_distance: eval.percent_distance(),
        };

        let notice = StockNotice {
            signal_id: None,
            ticker: ticker.to_string(),
            display_name: p.quote.display_name.clone(),
            signal_type: eval.signal,
            current_price: eval.current_price,
            sma,
            percent_distance: eval.percent_distance(),
        };

        if let Some(change) = ledger.apply(ticker, eval.signal, context, now) {
            info!(
                ticker,
                previous = ?change.previous,
                current = %change.current,
                "signal changed"
            );
            changed_notices.push(StockNotice {
                signal_id: Some(change.signal_id.clone()),
                ..notice.clone()
            });
            changes.push(change);
        }

        ledger.update_snapshot(StockSnapshot {
            ticker: ticker.to_string(),
            display_name: p.quote.display_name.clone(),
            owned: stock.owned,
            current_price: eval.current_price,
            sma,
            period_used: eval.period_used,
            percent_distance: eval.percent_distance(),
            slope_direction: eval.slope_direction,
            slope_ever_negative: eval.slope_ever_negative,
            signal_type: eval.signal,
            recent_sma: eval.recent_sma(RECENT_SMA_POINTS).to_vec(),
            updated_at: now,
        });

        rows.push(StockRow {
            ticker: ticker.to_string(),
            display_name: p.quote.display_name,
            owned: stock.owned,
            signal_type: eval.signal,
            current_price: eval.current_price,
            sma,
            percent_distance: eval.percent_distance(),
            period_used: eval.period_used,
            slope_direction: eval.slope_direction,
            slope_ever_negative: eval.slope_ever_negative,
            weeks: p.weeks,
            series_hash: p.fingerprint.series.0,
        });
        summaries.push(notice);
        processed.push(ticker.to_string());
    }

    let notices = plan_notifications(
        &changed_notices,
        &summaries,
        &config.subscribers,
        ledger,
        trigger,
        now,
    );
    let mut sent = 0;
    let mut failed = 0;
    let mut summaries_sent = 0;
    for notice in &notices {
        match dispatcher.dispatch(notice) {
            Ok(()) => {
                sent += 1;
                if notice.kind == NoticeKind::MarketSummary {
                    summaries_sent += 1;
                }
                if notice.is_alert() {
                    ledger.mark_notified(&notice.subscriber, notice.signal_ids());
                }
            }
            Err(e) => {
                failed += 1;
                warn!(
                    subscriber = %notice.subscriber,
                    dispatcher = dispatcher.name(),
                    error = %e,
                    "notification failed"
                );
            }
        }
    }

    let params = params_hash(&config.strategy).0;
    let report = JobReport {
        schema_version: REPORT_SCHEMA_VERSION,
        started_at: now,
        duration_ms: started.elapsed().as_millis() as u64,
        week_ending,
        trigger,
        run_hash: run_hash(&params, &rows),
        params_hash: params,
        processed,
        failures,
        signal_changes: changes,
        notifications_sent: sent,
        notifications_failed: failed,
        market_summaries_sent: summaries_sent,
        rows,
    };
    info!(summary = %report.summary_line(), "daily job finished");
    Ok(report)
}

/// Save the ledger and write the report artifacts. Returns the report directory.
pub fn persist_run(
    config: &WatchConfig,
    ledger: &SignalLedger,
    report: &JobReport,
) -> Result<PathBuf, JobError> {
    ledger.save(&config.output.ledger_path)?;
    let dir = report.save(&config.output.report_dir)?;
    info!(
        ledger = %config.output.ledger_path.display(),
        report = %dir.display(),
        "run persisted"
    );
    Ok(dir)
}

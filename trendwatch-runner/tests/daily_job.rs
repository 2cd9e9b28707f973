//! Daily job end to end: scripted providers, JSONL outbox, ledger on disk.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use trendwatch_core::data::{DataError, PriceHistoryProvider, Quote, QuoteProvider};
use trendwatch_core::domain::SignalType;
use trendwatch_core::WeeklyClose;
use trendwatch_runner::{
    persist_run, run_daily_job, DispatchError, JobReport, JsonlOutbox, MarketTrigger, Notice,
    NoticeKind, NotificationDispatcher, SignalLedger, WatchConfig,
};

// ── Helpers ──────────────────────────────────────────────────────────

/// Flat history at 100 for every ticker, live prices set per test.
struct Scripted {
    prices: Mutex<HashMap<String, f64>>,
}

impl Scripted {
    fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: Mutex::new(prices.iter().map(|(t, p)| (t.to_string(), *p)).collect()),
        }
    }

    fn set(&self, ticker: &str, price: f64) {
        self.prices.lock().unwrap().insert(ticker.to_string(), price);
    }
}

impl PriceHistoryProvider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch_weekly(&self, ticker: &str, years_back: u32) -> Result<Vec<WeeklyClose>, DataError> {
        assert_eq!(years_back, 11);
        if !self.prices.lock().unwrap().contains_key(ticker) {
            return Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }
        let start = NaiveDate::from_ymd_opt(2019, 1, 4).unwrap();
        Ok((0..260)
            .map(|i| WeeklyClose::new(start + Duration::weeks(i), 100.0))
            .collect())
    }
}

impl QuoteProvider for Scripted {
    fn fetch_quote(&self, ticker: &str) -> Result<Quote, DataError> {
        let price = self
            .prices
            .lock()
            .unwrap()
            .get(ticker)
            .copied()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            })?;
        Ok(Quote {
            price,
            display_name: format!("{ticker} Corp"),
        })
    }
}

struct Broken;

impl NotificationDispatcher for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn dispatch(&self, _: &Notice) -> Result<(), DispatchError> {
        Err(DispatchError::Io {
            path: "/dev/null".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "smtp down"),
        })
    }
}

fn config(dir: &std::path::Path) -> WatchConfig {
    let toml = format!(
        r#"
[output]
ledger_path = "{ledger}"
outbox_path = "{outbox}"
report_dir = "{reports}"

[[stocks]]
ticker = "AAPL"
owned = true

[[stocks]]
ticker = "MSFT"

[[subscribers]]
name = "alice"
email = "alice@example.com"
tickers = ["AAPL", "MSFT"]
daily_digest = true

[[subscribers]]
name = "bob"
email = "bob@example.com"
notification_email = "bob.alerts@example.com"
tickers = ["AAPL"]

[[subscribers]]
name = "carol"
email = "carol@example.com"
notifications_enabled = false
tickers = ["AAPL", "MSFT"]
daily_digest = true
"#,
        ledger = dir.join("ledger.json").display(),
        outbox = dir.join("outbox.jsonl").display(),
        reports = dir.join("reports").display(),
    );
    WatchConfig::from_toml(&toml).unwrap()
}

fn wednesday(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 13, hour, 0, 0).unwrap()
}

fn run(
    config: &WatchConfig,
    market: &Scripted,
    ledger: &mut SignalLedger,
    dispatcher: &dyn NotificationDispatcher,
    now: DateTime<Utc>,
) -> JobReport {
    run_daily_job(config, market, market, ledger, dispatcher, MarketTrigger::MarketClose, now).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn signals_alerts_and_dedup_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let outbox = JsonlOutbox::new(&config.output.outbox_path);
    // 199 weeks at 100 plus the live week: AAPL at 104 sits 3.98% above, MSFT at 90 is 9.95% below.
    let market = Scripted::new(&[("AAPL", 104.0), ("MSFT", 90.0)]);
    let mut ledger = SignalLedger::new();

    let first = run(&config, &market, &mut ledger, &outbox, wednesday(14));
    assert_eq!(first.processed, vec!["AAPL", "MSFT"]);
    assert_eq!(first.signal_changes.len(), 2);
    assert_eq!(ledger.active("AAPL").unwrap().signal_type, SignalType::Buy);
    assert_eq!(ledger.active("MSFT").unwrap().signal_type, SignalType::SellLow);

    let sent = outbox.read_all().unwrap();
    let kinds: Vec<_> = sent.iter().map(|n| (n.subscriber.as_str(), n.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("alice", NoticeKind::BuyAlert),
            ("alice", NoticeKind::SellAlert),
            ("alice", NoticeKind::DailyDigest),
            ("alice", NoticeKind::MarketSummary),
            ("bob", NoticeKind::BuyAlert),
            ("bob", NoticeKind::MarketSummary),
        ]
    );
    assert_eq!(first.notifications_sent, 6);
    assert_eq!(first.market_summaries_sent, 2);
    assert_eq!(sent[0].stocks[0].display_name, "AAPL Corp");
    assert!(sent[4..].iter().all(|n| n.email == "bob.alerts@example.com"));

    // Bob has no digest but still sees the change in his summary.
    assert_eq!(sent[5].changes.len(), 1);
    assert_eq!(sent[5].changes[0].ticker, "AAPL");

    // Same prices later in the day: nothing changes, only summaries go out.
    let second = run(&config, &market, &mut ledger, &outbox, wednesday(20));
    assert!(second.signal_changes.is_empty());
    assert_eq!(second.notifications_sent, 2);
    assert_eq!(second.market_summaries_sent, 2);
    assert_eq!(outbox.read_all().unwrap().len(), 8);

    // AAPL falls back to its average: BUY resolves into NEUTRAL, which is not
    // alerted but shows up in alice's digest.
    market.set("AAPL", 100.0);
    let third = run(&config, &market, &mut ledger, &outbox, wednesday(21));
    assert_eq!(third.signal_changes.len(), 1);
    assert_eq!(third.signal_changes[0].previous, Some(SignalType::Buy));
    assert_eq!(third.signal_changes[0].current, SignalType::Neutral);
    assert_eq!(third.notifications_sent, 3);
    assert_eq!(ledger.notified_count("bob"), 0);

    let aapl: Vec<_> = ledger.history("AAPL").collect();
    assert_eq!(aapl.len(), 2);
    assert_eq!(aapl[0].resolved_at, Some(wednesday(21)));
}

#[test]
fn disabled_subscriber_receives_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let outbox = JsonlOutbox::new(&config.output.outbox_path);
    let market = Scripted::new(&[("AAPL", 104.0), ("MSFT", 90.0)]);

    run(&config, &market, &mut SignalLedger::new(), &outbox, wednesday(14));
    let notices = outbox.read_all().unwrap();
    assert!(!notices.is_empty());
    assert!(notices.iter().all(|n| n.subscriber != "carol"));
}

#[test]
fn market_open_trigger_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let outbox = JsonlOutbox::new(&config.output.outbox_path);
    let market = Scripted::new(&[("AAPL", 100.0), ("MSFT", 100.0)]);

    let report = run_daily_job(
        &config,
        &market,
        &market,
        &mut SignalLedger::new(),
        &outbox,
        MarketTrigger::MarketOpen,
        wednesday(14),
    )
    .unwrap();
    assert_eq!(report.trigger, MarketTrigger::MarketOpen);

    let summaries: Vec<_> = outbox
        .read_all()
        .unwrap()
        .into_iter()
        .filter(|n| n.kind == NoticeKind::MarketSummary)
        .collect();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].subject, "Market Open Summary: 2 stocks, 2024-03-13");
    assert_eq!(summaries[1].subject, "Market Open Summary: 1 stocks, 2024-03-13");
}

#[test]
fn persisted_ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let outbox = JsonlOutbox::new(&config.output.outbox_path);
    let market = Scripted::new(&[("AAPL", 104.0), ("MSFT", 90.0)]);

    let mut ledger = SignalLedger::new();
    let report = run(&config, &market, &mut ledger, &outbox, wednesday(14));
    let report_dir = persist_run(&config, &ledger, &report).unwrap();
    assert!(report_dir.join("report.json").exists());
    assert!(report_dir.join("stocks.csv").exists());

    let mut reloaded = SignalLedger::load(&config.output.ledger_path).unwrap();
    let ids = |l: &SignalLedger| l.signals().iter().map(|s| s.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&reloaded), ids(&ledger));
    assert_eq!(reloaded.snapshots().count(), 2);

    // Already-alerted signals are not alerted again after a restart.
    let again = run(&config, &market, &mut reloaded, &outbox, wednesday(15));
    assert!(again.signal_changes.is_empty());
    let alerts = outbox.read_all().unwrap().iter().filter(|n| n.is_alert()).count();
    assert_eq!(alerts, 3);
}

#[test]
fn missing_ticker_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let market = Scripted::new(&[("AAPL", 104.0)]);
    let mut ledger = SignalLedger::new();
    let outbox = JsonlOutbox::new(&config.output.outbox_path);

    let report = run(&config, &market, &mut ledger, &outbox, wednesday(14));

    assert_eq!(report.processed, vec!["AAPL"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].ticker, "MSFT");
    assert!(ledger.snapshot("MSFT").is_none());
    assert_eq!(ledger.snapshot("AAPL").unwrap().signal_type, SignalType::Buy);
}

#[test]
fn failed_delivery_is_counted_and_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let market = Scripted::new(&[("AAPL", 104.0), ("MSFT", 90.0)]);
    let mut ledger = SignalLedger::new();

    let report = run(&config, &market, &mut ledger, &Broken, wednesday(14));
    assert_eq!(report.notifications_sent, 0);
    assert_eq!(report.notifications_failed, 6);
    assert_eq!(report.market_summaries_sent, 0);

    let buy_id = &ledger.active("AAPL").unwrap().id;
    assert!(!ledger.was_notified("alice", buy_id));
    assert!(!ledger.was_notified("bob", buy_id));
}

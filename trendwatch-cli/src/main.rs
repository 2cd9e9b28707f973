//! TrendWatch CLI: evaluate, fetch, run and ledger commands.
//!
//! Commands:
//! - `evaluate`: classify one weekly series from a CSV file
//! - `fetch`: download weekly history and write it as CSV
//! - `run`: execute the daily watchlist job from a TOML config
//! - `ledger`: print active signals and signal history

mod logging;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use trendwatch_core::data::{
    read_weekly_csv, save_weekly_csv, AlphaVantageProvider, CircuitBreaker, CsvProvider,
    FallbackProvider, PriceHistoryProvider, QuoteProvider, SyntheticProvider, YahooProvider,
};
use trendwatch_core::data::alpha_vantage::DEFAULT_KEY_ENV;
use trendwatch_core::{evaluate_stock, StockEvaluation, StrategyParams};
use trendwatch_runner::{
    persist_run, run_daily_job, JobReport, JsonlOutbox, LogDispatcher, MarketTrigger,
    NotificationDispatcher, ProviderKind, SignalLedger, WatchConfig,
};

/// Seed for `run --synthetic`.
const SYNTHETIC_SEED: u64 = 42;

#[derive(Parser)]
#[command(
    name = "trendwatch",
    about = "TrendWatch CLI: 200-week moving average buy/sell signals"
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one weekly series from a CSV file (columns: week_ending,close).
    Evaluate {
        /// CSV file with weekly closes.
        #[arg(long)]
        csv: PathBuf,

        /// Current price. Defaults to the last close in the file.
        #[arg(long)]
        price: Option<f64>,

        /// Ticker shown in the output.
        #[arg(long)]
        ticker: Option<String>,

        /// Optional watchlist config to take strategy parameters from.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Download weekly history from Yahoo Finance (Alpha Vantage fallback) and write CSV.
    Fetch {
        ticker: String,

        /// Years of history.
        #[arg(long, default_value_t = 11)]
        years: u32,

        /// Output file. Defaults to ./data/{TICKER}.csv.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run the daily job for a watchlist.
    Run {
        /// Path to the TOML watchlist config.
        #[arg(long)]
        config: PathBuf,

        /// Offline mode: read history and prices from the config's csv_dir.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Use seeded synthetic data instead of any provider.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Log notifications instead of writing the outbox, and persist nothing.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Market session for the summary notice: market_open or market_close.
        #[arg(long, default_value = "market_close")]
        trigger: MarketTrigger,
    },
    /// Print the signal ledger.
    Ledger {
        /// Ledger file.
        #[arg(long, default_value = "state/ledger.json")]
        path: PathBuf,

        /// Only show this ticker's history.
        #[arg(long)]
        ticker: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_json);

    match cli.command {
        Commands::Evaluate {
            csv,
            price,
            ticker,
            config,
        } => run_evaluate(&csv, price, ticker, config.as_deref()),
        Commands::Fetch { ticker, years, out } => run_fetch(&ticker, years, out),
        Commands::Run {
            config,
            offline,
            synthetic,
            dry_run,
            trigger,
        } => run_job(&config, offline, synthetic, dry_run, trigger),
        Commands::Ledger { path, ticker } => run_ledger(&path, ticker.as_deref()),
    }
}

fn run_evaluate(
    csv: &Path,
    price: Option<f64>,
    ticker: Option<String>,
    config: Option<&Path>,
) -> Result<()> {
    let file = std::fs::File::open(csv).with_context(|| format!("open {}", csv.display()))?;
    let series = read_weekly_csv(file)?;
    let Some(last) = series.last() else {
        bail!("{} has no weekly closes", csv.display());
    };

    let params = match config {
        Some(path) => WatchConfig::from_file(path)?.strategy,
        None => StrategyParams::default(),
    };
    let price = price.unwrap_or(last.close);
    let ticker = ticker.unwrap_or_else(|| {
        csv.file_stem()
            .map(|s| s.to_string_lossy().to_uppercase())
            .unwrap_or_else(|| "?".into())
    });

    let eval = evaluate_stock(&series, price, &params)?;
    print_evaluation(&ticker, series.len(), &params, &eval);
    Ok(())
}

fn print_evaluation(ticker: &str, weeks: usize, params: &StrategyParams, eval: &StockEvaluation) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    println!("=== {ticker} ===");
    println!("Weeks of history:    {weeks}");
    println!("Current price:       {:.2}", eval.current_price);
    match eval.sma() {
        Some(sma) => {
            println!("SMA ({} weeks):     {:.2}", eval.period_used, sma);
            println!("Distance from SMA:   {:+.2}%", eval.percent_distance());
        }
        None => println!(
            "SMA:                 n/a (need at least {} weeks)",
            params.min_sma_weeks
        ),
    }
    println!("Slope direction:     {:?}", eval.slope_direction);
    println!("Slope ever negative: {}", yes_no(eval.slope_ever_negative));
    println!();
    println!("Buy criteria");
    println!("  price above SMA:          {}", yes_no(eval.buy.price_above_sma));
    println!(
        "  no negative slope ({}w): {}",
        params.slope_history_weeks,
        yes_no(eval.buy.slope_never_negative)
    );
    println!(
        "  within {:.0}% of SMA:       {}",
        params.buy_max_above_pct,
        yes_no(eval.buy.within_threshold)
    );
    println!("Sell criteria");
    println!(
        "  >= {:.0}% above SMA:        {}",
        params.sell_above_pct,
        yes_no(eval.sell.is_far_above)
    );
    println!(
        "  >= {:.0}% below SMA:         {}",
        params.sell_below_pct,
        yes_no(eval.sell.is_far_below)
    );
    println!();
    println!("Signal: {}", eval.signal);
}

/// Yahoo weekly history, backed by Alpha Vantage when `key_env` is set.
fn network_history(
    breaker: Arc<CircuitBreaker>,
    key_env: &str,
) -> Result<Box<dyn PriceHistoryProvider>> {
    let yahoo = YahooProvider::new(breaker)?;
    let provider: Box<dyn PriceHistoryProvider> = match AlphaVantageProvider::from_env(key_env) {
        Ok(av) => Box::new(FallbackProvider::new(yahoo, av)),
        Err(_) => {
            info!(env = key_env, "no Alpha Vantage key, Yahoo only");
            Box::new(yahoo)
        }
    };
    Ok(provider)
}

fn run_fetch(ticker: &str, years: u32, out: Option<PathBuf>) -> Result<()> {
    let ticker = ticker.trim().to_uppercase();
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = network_history(breaker, DEFAULT_KEY_ENV)?;

    let series = provider.fetch_weekly(&ticker, years)?;
    let out = out.unwrap_or_else(|| PathBuf::from("data").join(format!("{ticker}.csv")));
    save_weekly_csv(&out, &series)?;

    match (series.first(), series.last()) {
        (Some(first), Some(last)) => println!(
            "{ticker}: {} weeks ({} to {}) -> {}",
            series.len(),
            first.week_ending,
            last.week_ending,
            out.display()
        ),
        _ => println!("{ticker}: no data -> {}", out.display()),
    }
    Ok(())
}

type Providers = (Box<dyn PriceHistoryProvider>, Box<dyn QuoteProvider>);

fn build_providers(config: &WatchConfig, offline: bool, synthetic: bool) -> Result<Providers> {
    if synthetic {
        let today = Utc::now().date_naive();
        warn!("using SYNTHETIC data");
        let history: Box<dyn PriceHistoryProvider> =
            Box::new(SyntheticProvider::new(today, SYNTHETIC_SEED));
        let quotes: Box<dyn QuoteProvider> =
            Box::new(SyntheticProvider::new(today, SYNTHETIC_SEED));
        return Ok((history, quotes));
    }

    if offline || config.data.provider == ProviderKind::Csv {
        let dir = &config.data.csv_dir;
        if !dir.is_dir() {
            bail!("csv_dir {} does not exist", dir.display());
        }
        let history: Box<dyn PriceHistoryProvider> = Box::new(CsvProvider::new(dir));
        let quotes: Box<dyn QuoteProvider> = Box::new(CsvProvider::new(dir));
        return Ok((history, quotes));
    }

    let breaker = Arc::new(CircuitBreaker::default_provider());
    let key_env = config
        .data
        .alpha_vantage_key_env
        .as_deref()
        .unwrap_or(DEFAULT_KEY_ENV);
    let history = network_history(Arc::clone(&breaker), key_env)?;
    let quotes: Box<dyn QuoteProvider> = Box::new(YahooProvider::new(breaker)?);
    Ok((history, quotes))
}

fn run_job(
    config_path: &Path,
    offline: bool,
    synthetic: bool,
    dry_run: bool,
    trigger: MarketTrigger,
) -> Result<()> {
    if offline && synthetic {
        bail!("--offline and --synthetic are mutually exclusive");
    }

    let config = WatchConfig::from_file(config_path)?;
    let (history, quotes) = build_providers(&config, offline, synthetic)?;
    let mut ledger = SignalLedger::load(&config.output.ledger_path)?;

    let outbox = JsonlOutbox::new(&config.output.outbox_path);
    let dispatcher: &dyn NotificationDispatcher = if dry_run { &LogDispatcher } else { &outbox };

    let report = run_daily_job(
        &config,
        history.as_ref(),
        quotes.as_ref(),
        &mut ledger,
        dispatcher,
        trigger,
        Utc::now(),
    )?;

    print_report(&report);

    if dry_run {
        println!("Dry run: ledger and report not saved");
    } else {
        let dir = persist_run(&config, &ledger, &report)?;
        println!("Report saved to: {}", dir.display());
    }

    if report.processed.is_empty() && !report.failures.is_empty() {
        bail!("every stock failed; see errors above");
    }
    Ok(())
}

fn print_report(report: &JobReport) {
    println!("{} run, week ending {}", report.trigger.label(), report.week_ending);
    println!(
        "{:<8} {:<10} {:>10} {:>10} {:>9} {:>6}",
        "Ticker", "Signal", "Price", "SMA", "vs SMA", "Slope"
    );
    println!("{}", "-".repeat(58));
    for row in &report.rows {
        let sma = row.sma.map(|v| format!("{v:.2}")).unwrap_or_else(|| "n/a".into());
        println!(
            "{:<8} {:<10} {:>10.2} {:>10} {:>8.2}% {:>6}",
            row.ticker,
            row.signal_type.as_str(),
            row.current_price,
            sma,
            row.percent_distance,
            format!("{:?}", row.slope_direction).to_lowercase(),
        );
    }
    for failure in &report.failures {
        println!("{:<8} FAILED     {}", failure.ticker, failure.error);
    }
    println!();
    println!("{}", report.summary_line());
}

fn run_ledger(path: &Path, ticker: Option<&str>) -> Result<()> {
    if !path.exists() {
        println!("No ledger at {}", path.display());
        return Ok(());
    }
    let ledger = SignalLedger::load(path)?;

    if let Some(ticker) = ticker {
        let ticker = ticker.to_uppercase();
        println!("History for {ticker}:");
        for record in ledger.history(&ticker) {
            let resolved = record
                .resolved_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "active".into());
            println!(
                "  {:<10} {}  ->  {:<16}  price {:.2}  ({:+.2}%)  [{}]",
                record.signal_type.as_str(),
                record.triggered_at.format("%Y-%m-%d %H:%M"),
                resolved,
                record.price,
                record.percent_distance,
                record.id,
            );
        }
        return Ok(());
    }

    println!("{:<8} {:<10} {:<17} {:>10} {:>9}", "Ticker", "Signal", "Since", "Price", "vs SMA");
    println!("{}", "-".repeat(58));
    let mut active: Vec<_> = ledger.active_signals().collect();
    active.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    for record in active {
        println!(
            "{:<8} {:<10} {:<17} {:>10.2} {:>8.2}%",
            record.ticker,
            record.signal_type.as_str(),
            record.triggered_at.format("%Y-%m-%d %H:%M").to_string(),
            record.price,
            record.percent_distance,
        );
    }
    println!();
    println!("{} signals recorded", ledger.signals().len());
    Ok(())
}

//! Property tests for ledger transitions.
//!
//! Uses proptest to verify:
//! 1. At most one active signal per ticker after any sequence of updates
//! 2. A new record appears exactly when the signal type changes
//! 3. Every resolved record has a resolution time no earlier than its trigger

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use trendwatch_core::domain::SignalType;
use trendwatch_runner::ledger::SignalContext;
use trendwatch_runner::SignalLedger;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_signal() -> impl Strategy<Value = SignalType> {
    prop::sample::select(SignalType::ALL.to_vec())
}

fn arb_updates() -> impl Strategy<Value = Vec<(usize, SignalType)>> {
    prop::collection::vec((0usize..3, arb_signal()), 0..60)
}

const TICKERS: [&str; 3] = ["AAPL", "MSFT", "NVDA"];

fn ctx() -> SignalContext {
    SignalContext {
        price: 100.0,
        sma: Some(100.0),
        percent_distance: 0.0,
    }
}

proptest! {
    #[test]
    fn one_active_signal_per_ticker(updates in arb_updates()) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 21, 0, 0).unwrap();
        let mut ledger = SignalLedger::new();
        let mut last: [Option<SignalType>; 3] = [None; 3];
        let mut expected_records = 0;

        for (day, (t, signal)) in updates.into_iter().enumerate() {
            let now = start + Duration::days(day as i64);
            let change = ledger.apply(TICKERS[t], signal, ctx(), now);
            let changed = last[t] != Some(signal);
            prop_assert_eq!(change.is_some(), changed);
            if changed {
                expected_records += 1;
                last[t] = Some(signal);
            }
        }

        prop_assert_eq!(ledger.signals().len(), expected_records);

        let mut seen = HashSet::new();
        for active in ledger.active_signals() {
            prop_assert!(seen.insert(active.ticker.clone()));
        }
        for (t, ticker) in TICKERS.iter().enumerate() {
            prop_assert_eq!(ledger.active(ticker).map(|s| s.signal_type), last[t]);
        }

        let ids: HashSet<_> = ledger.signals().iter().map(|s| s.id.as_str()).collect();
        prop_assert_eq!(ids.len(), ledger.signals().len());

        for record in ledger.signals() {
            if let Some(resolved) = record.resolved_at {
                prop_assert!(!record.is_active);
                prop_assert!(resolved >= record.triggered_at);
            }
        }
    }
}

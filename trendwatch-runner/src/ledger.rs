//! Signal ledger: the persistent record of signals per ticker.
//!
//! At most one signal per ticker is active. A new classification that
//! differs from the active one (or the first classification a ticker ever
//! gets) resolves the old record and opens a new one with a fresh id.
//! The ledger also remembers which signal ids each subscriber has been told
//! about, so alerts are never sent twice.
//!
//! Persisted as pretty JSON with a `schema_version`; saves are atomic
//! (write `.tmp`, rename into place).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use trendwatch_core::domain::{SignalType, SlopeDirection, SmaPoint};

pub const LEDGER_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ledger JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported ledger schema version {found} (max supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// One signal in a ticker's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub id: String,
    pub ticker: String,
    pub signal_type: SignalType,
    pub is_active: bool,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub price: f64,
    pub sma: Option<f64>,
    pub percent_distance: f64,
}

/// Latest computed state of a watched stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub ticker: String,
    pub display_name: String,
    pub owned: bool,
    pub current_price: f64,
    pub sma: Option<f64>,
    pub period_used: usize,
    pub percent_distance: f64,
    pub slope_direction: SlopeDirection,
    pub slope_ever_negative: bool,
    pub signal_type: SignalType,
    /// Last few SMA values, oldest first.
    pub recent_sma: Vec<SmaPoint>,
    pub updated_at: DateTime<Utc>,
}

/// Result of applying a classification that changed a ticker's signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalChange {
    pub signal_id: String,
    pub ticker: String,
    pub previous: Option<SignalType>,
    pub current: SignalType,
}

/// Price context stored with a new signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalContext {
    pub price: f64,
    pub sma: Option<f64>,
    pub percent_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalLedger {
    pub schema_version: u32,
    #[serde(default)]
    signals: Vec<SignalRecord>,
    #[serde(default)]
    stocks: BTreeMap<String, StockSnapshot>,
    /// Subscriber name → signal ids already delivered.
    #[serde(default)]
    notified: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    next_seq: u64,
}

impl Default for SignalLedger {
    fn default() -> Self {
        Self {
            schema_version: LEDGER_SCHEMA_VERSION,
            signals: Vec::new(),
            stocks: BTreeMap::new(),
            notified: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl SignalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(LedgerError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, LedgerError> {
        let mut ledger: SignalLedger = serde_json::from_str(json)?;
        if ledger.schema_version > LEDGER_SCHEMA_VERSION {
            return Err(LedgerError::UnsupportedVersion {
                found: ledger.schema_version,
                supported: LEDGER_SCHEMA_VERSION,
            });
        }
        ledger.prune_notified();
        Ok(ledger)
    }

    /// Write atomically: `.tmp` sibling first, then rename.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let io_err = |source: io::Error| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)
    }

    pub fn active(&self, ticker: &str) -> Option<&SignalRecord> {
        self.signals
            .iter()
            .rev()
            .find(|s| s.is_active && s.ticker == ticker)
    }

    pub fn active_signals(&self) -> impl Iterator<Item = &SignalRecord> {
        self.signals.iter().filter(|s| s.is_active)
    }

    /// All records for `ticker`, oldest first.
    pub fn history<'a>(&'a self, ticker: &'a str) -> impl Iterator<Item = &'a SignalRecord> + 'a {
        self.signals.iter().filter(move |s| s.ticker == ticker)
    }

    pub fn signals(&self) -> &[SignalRecord] {
        &self.signals
    }

    /// Record today's classification for `ticker`.
    ///
    /// Returns `None` when the active signal already has this type.
    pub fn apply(
        &mut self,
        ticker: &str,
        signal_type: SignalType,
        context: SignalContext,
        now: DateTime<Utc>,
    ) -> Option<SignalChange> {
        let previous = self.active(ticker).map(|s| s.signal_type);
        if previous == Some(signal_type) {
            return None;
        }

        for record in self.signals.iter_mut().filter(|s| s.is_active && s.ticker == ticker) {
            record.is_active = false;
            record.resolved_at = Some(now);
        }
        if previous.is_some() {
            self.prune_notified();
        }

        let id = self.fresh_id(ticker, signal_type, now);
        self.signals.push(SignalRecord {
            id: id.clone(),
            ticker: ticker.to_string(),
            signal_type,
            is_active: true,
            triggered_at: now,
            resolved_at: None,
            price: context.price,
            sma: context.sma,
            percent_distance: context.percent_distance,
        });

        Some(SignalChange {
            signal_id: id,
            ticker: ticker.to_string(),
            previous,
            current: signal_type,
        })
    }

    fn fresh_id(&mut self, ticker: &str, signal_type: SignalType, now: DateTime<Utc>) -> String {
        let seq = self.next_seq;
        self.next_seq += 1;
        let mut hasher = blake3::Hasher::new();
        hasher.update(ticker.as_bytes());
        hasher.update(signal_type.as_str().as_bytes());
        hasher.update(now.to_rfc3339().as_bytes());
        hasher.update(&seq.to_le_bytes());
        let hex = hasher.finalize().to_hex();
        format!("sig_{}", &hex.as_str()[..16])
    }

    pub fn snapshot(&self, ticker: &str) -> Option<&StockSnapshot> {
        self.stocks.get(ticker)
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &StockSnapshot> {
        self.stocks.values()
    }

    pub fn update_snapshot(&mut self, snapshot: StockSnapshot) {
        self.stocks.insert(snapshot.ticker.clone(), snapshot);
    }

    pub fn was_notified(&self, subscriber: &str, signal_id: &str) -> bool {
        self.notified
            .get(subscriber)
            .is_some_and(|ids| ids.contains(signal_id))
    }

    pub fn mark_notified<'a>(&mut self, subscriber: &str, ids: impl IntoIterator<Item = &'a str>) {
        let entry = self.notified.entry(subscriber.to_string()).or_default();
        entry.extend(ids.into_iter().map(str::to_string));
    }

    /// Forget delivered ids whose signal is no longer active.
    ///
    /// Resolved signals are never alerted again, so only active ids are
    /// needed for deduplication. Returns how many ids were dropped.
    pub fn prune_notified(&mut self) -> usize {
        let active: BTreeSet<String> = self.active_signals().map(|s| s.id.clone()).collect();
        let mut dropped = 0;
        for ids in self.notified.values_mut() {
            let before = ids.len();
            ids.retain(|id| active.contains(id));
            dropped += before - ids.len();
        }
        self.notified.retain(|_, ids| !ids.is_empty());
        dropped
    }

    /// Number of delivered ids held for `subscriber`.
    pub fn notified_count(&self, subscriber: &str) -> usize {
        self.notified.get(subscriber).map_or(0, BTreeSet::len)
    }
}

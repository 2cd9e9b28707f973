//! CSV import/export of weekly closes.
//!
//! File format: a header row `week_ending,close` followed by one row per week,
//! dates as `YYYY-MM-DD`. Rows may appear in any order; duplicates keep the
//! last row.

use super::provider::{DataError, PriceHistoryProvider, Quote, QuoteProvider};
use crate::domain::{normalize_series, WeeklyClose};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Read weekly closes from any CSV source.
pub fn read_weekly_csv<R: Read>(reader: R) -> Result<Vec<WeeklyClose>, DataError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut weeks = Vec::new();
    for (line, record) in rdr.deserialize::<WeeklyClose>().enumerate() {
        let week = record?;
        if !week.is_sane() {
            return Err(DataError::ValidationError(format!(
                "row {}: close {} on {} is not a positive price",
                line + 2,
                week.close,
                week.week_ending
            )));
        }
        weeks.push(week);
    }
    Ok(normalize_series(weeks))
}

/// Write weekly closes as CSV.
pub fn write_weekly_csv<W: Write>(writer: W, weeks: &[WeeklyClose]) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for week in weeks {
        wtr.serialize(week)?;
    }
    wtr.flush()
        .map_err(|e| DataError::Csv(format!("failed to flush CSV writer: {e}")))
}

/// Write weekly closes to `path` atomically (write to `.tmp`, rename into place).
pub fn save_weekly_csv(path: &Path, weeks: &[WeeklyClose]) -> Result<(), DataError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DataError::Other(format!("mkdir {}: {e}", parent.display())))?;
    }
    let tmp = path.with_extension("csv.tmp");
    let file = fs::File::create(&tmp)
        .map_err(|e| DataError::Other(format!("create {}: {e}", tmp.display())))?;
    write_weekly_csv(file, weeks)?;
    fs::rename(&tmp, path)
        .map_err(|e| DataError::Other(format!("rename to {}: {e}", path.display())))
}

/// Offline provider reading `{dir}/{TICKER}.csv`.
///
/// The quote is the most recent close in the file and the display name is
/// the ticker itself. Series are evaluated as saved; no week is added for
/// the run date.
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker.to_uppercase()))
    }

    fn load(&self, ticker: &str) -> Result<Vec<WeeklyClose>, DataError> {
        let path = self.path_for(ticker);
        let file = fs::File::open(&path).map_err(|_| DataError::SymbolNotFound {
            symbol: ticker.to_string(),
        })?;
        read_weekly_csv(file)
    }
}

impl PriceHistoryProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_weekly(&self, ticker: &str, _years_back: u32) -> Result<Vec<WeeklyClose>, DataError> {
        self.load(ticker)
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}

impl QuoteProvider for CsvProvider {
    fn fetch_quote(&self, ticker: &str) -> Result<Quote, DataError> {
        let weeks = self.load(ticker)?;
        let last = weeks.last().ok_or_else(|| DataError::SymbolNotFound {
            symbol: ticker.to_string(),
        })?;
        Ok(Quote {
            price: last.close,
            display_name: ticker.to_uppercase(),
        })
    }

    fn quotes_from_history(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn reads_unsorted_rows_with_duplicates() {
        let data = "week_ending,close\n2024-01-12, 11.0\n2024-01-05,10.0\n2024-01-12,12.0\n";
        let weeks = read_weekly_csv(data.as_bytes()).unwrap();
        assert_eq!(
            weeks,
            vec![
                WeeklyClose::new(d(2024, 1, 5), 10.0),
                WeeklyClose::new(d(2024, 1, 12), 12.0),
            ]
        );
    }

    #[test]
    fn rejects_non_positive_close() {
        let data = "week_ending,close\n2024-01-05,0\n";
        let err = read_weekly_csv(data.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::ValidationError(msg) if msg.contains("row 2")));
    }

    #[test]
    fn rejects_malformed_date() {
        let data = "week_ending,close\n01/05/2024,10\n";
        assert!(matches!(read_weekly_csv(data.as_bytes()), Err(DataError::Csv(_))));
    }

    #[test]
    fn provider_reads_saved_file() {
        let dir = tempfile::tempdir().unwrap();
        let weeks = vec![
            WeeklyClose::new(d(2024, 1, 5), 10.0),
            WeeklyClose::new(d(2024, 1, 12), 12.5),
        ];
        let provider = CsvProvider::new(dir.path());
        save_weekly_csv(&provider.path_for("spy"), &weeks).unwrap();
        assert!(!dir.path().join("SPY.csv.tmp").exists());

        assert_eq!(provider.fetch_weekly("SPY", 10).unwrap(), weeks);
        let quote = provider.fetch_quote("spy").unwrap();
        assert_eq!(quote.price, 12.5);
        assert_eq!(quote.display_name, "SPY");
        assert!(provider.quotes_from_history());
    }

    #[test]
    fn missing_file_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvProvider::new(dir.path());
        assert!(matches!(
            provider.fetch_weekly("NONE", 10),
            Err(DataError::SymbolNotFound { .. })
        ));
    }
}

//! CSV file data adapter.
//!
//! Layout under the base directory:
//!
//! - `<SYMBOL>_<interval>.csv` or `<SYMBOL>.csv`:
//!   `timestamp,open,high,low,close,volume`, where `timestamp` is a date
//!   (`2024-01-15`) or a date-time (`2024-01-15 09:30:00` / `2024-01-15T09:30:00`)
//! - `info.csv` (optional): `symbol,market_cap,avg_volume,sector`, blank
//!   fields meaning unknown
//!
//! Rows may be in any order; the series is sorted and then trimmed to the
//! requested period, counted back from the latest bar. Files are expected to
//! already be sampled at the requested interval.

use crate::domain::error::RankError;
use crate::domain::interval::{Interval, Period};
use crate::domain::ohlcv::{OhlcvBar, PriceSeries};
use crate::ports::data_port::{DataPort, SymbolInfo};
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

const INFO_FILE: &str = "info.csv";
const INTRADAY_MAX_DAYS: i64 = 60;
const MINUTE_MAX_DAYS: i64 = 7;

pub struct CsvAdapter {
    base_path: PathBuf,
    info: OnceLock<Result<HashMap<String, SymbolInfo>, String>>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            info: OnceLock::new(),
        }
    }

    fn csv_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        let specific = self.base_path.join(format!("{}_{}.csv", symbol, interval));
        if specific.is_file() {
            specific
        } else {
            self.base_path.join(format!("{}.csv", symbol))
        }
    }

    /// Symbols with a price file in the base directory, sorted.
    pub fn list_symbols(&self) -> Result<Vec<String>, RankError> {
        let entries = fs::read_dir(&self.base_path)?;
        let mut symbols = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".csv") else {
                continue;
            };
            if name == INFO_FILE {
                continue;
            }
            let symbol = stem.split('_').next().unwrap_or(stem).to_uppercase();
            if !symbol.is_empty() && !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    fn load_info(&self) -> Result<HashMap<String, SymbolInfo>, String> {
        let path = self.base_path.join(INFO_FILE);
        if !path.is_file() {
            return Ok(HashMap::new());
        }
        let mut rdr = csv::Reader::from_path(&path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let mut table = HashMap::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| format!("{} parse error: {}", INFO_FILE, e))?;
            let symbol = record.get(0).unwrap_or("").trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            let number = |index: usize| -> Result<Option<f64>, String> {
                match record.get(index).map(str::trim) {
                    None | Some("") => Ok(None),
                    Some(s) => s.parse().map(Some).map_err(|e| {
                        format!("{} row {}: invalid number '{}': {}", INFO_FILE, line + 1, s, e)
                    }),
                }
            };
            let info = SymbolInfo {
                market_cap: number(1)?,
                avg_volume: number(2)?,
                sector: record
                    .get(3)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            };
            table.insert(symbol, info);
        }
        Ok(table)
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    symbol: &str,
) -> Result<T, RankError>
where
    T::Err: std::fmt::Display,
{
    let raw = record.get(index).ok_or_else(|| RankError::InvalidSeries {
        symbol: symbol.to_string(),
        reason: format!("missing {} column", name),
    })?;
    raw.trim().parse().map_err(|e| RankError::InvalidSeries {
        symbol: symbol.to_string(),
        reason: format!("invalid {} value '{}': {}", name, raw, e),
    })
}

/// Earliest timestamp kept for `period` ending at `latest`.
fn period_start(latest: NaiveDateTime, period: Period, interval: Interval) -> Option<NaiveDateTime> {
    let start = match period {
        Period::Days(d) => Some(latest - Duration::days(i64::from(d))),
        Period::Months(m) => latest.checked_sub_months(Months::new(m)),
        Period::Years(y) => latest.checked_sub_months(Months::new(y * 12)),
        Period::YearToDate => NaiveDate::from_ymd_opt(latest.year(), 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        Period::Max => None,
    };
    let cap = match interval {
        Interval::Minutes(1) => Some(latest - Duration::days(MINUTE_MAX_DAYS)),
        Interval::Minutes(_) => Some(latest - Duration::days(INTRADAY_MAX_DAYS)),
        _ => None,
    };
    match (start, cap) {
        (Some(s), Some(c)) => Some(s.max(c)),
        (s, c) => s.or(c),
    }
}

impl DataPort for CsvAdapter {
    fn fetch_series(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries, RankError> {
        let path = self.csv_path(symbol, interval);
        let mut rdr =
            csv::Reader::from_path(&path).map_err(|e| RankError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("failed to read {}: {}", path.display(), e),
            })?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| RankError::InvalidSeries {
                symbol: symbol.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let raw = record.get(0).unwrap_or("");
            let timestamp = parse_timestamp(raw).ok_or_else(|| RankError::InvalidSeries {
                symbol: symbol.to_string(),
                reason: format!("invalid timestamp '{}'", raw),
            })?;

            bars.push(OhlcvBar {
                timestamp,
                open: parse_field(&record, 1, "open", symbol)?,
                high: parse_field(&record, 2, "high", symbol)?,
                low: parse_field(&record, 3, "low", symbol)?,
                close: parse_field(&record, 4, "close", symbol)?,
                volume: parse_field(&record, 5, "volume", symbol)?,
            });
        }

        if bars.is_empty() {
            return Err(RankError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no rows in {}", path.display()),
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        if let Some(start) = bars
            .last()
            .and_then(|b| period_start(b.timestamp, period, interval))
        {
            bars.retain(|b| b.timestamp >= start);
        }

        PriceSeries::new(symbol, bars)
    }

    fn fetch_info(&self, symbol: &str) -> Result<SymbolInfo, RankError> {
        let table = self
            .info
            .get_or_init(|| self.load_info())
            .as_ref()
            .map_err(|reason| RankError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            })?;
        table
            .get(&symbol.to_uppercase())
            .cloned()
            .ok_or_else(|| RankError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("not listed in {}", INFO_FILE),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n";
        fs::write(path.join("BHP.csv"), csv_content).unwrap();

        let intraday = "timestamp,open,high,low,close,volume\n\
            2024-03-01 09:30:00,10.0,10.5,9.9,10.2,1200\n\
            2024-03-01T10:30:00,10.2,10.6,10.1,10.4,900\n";
        fs::write(path.join("BHP_1h.csv"), intraday).unwrap();

        fs::write(path.join("CBA.csv"), "timestamp,open,high,low,close,volume\n").unwrap();
        fs::write(
            path.join(INFO_FILE),
            "symbol,market_cap,avg_volume,sector\n\
             BHP,150000000000,7500000,Materials\n\
             CBA,,,\n",
        )
        .unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_series_parses_and_sorts() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter
            .fetch_series("BHP", Period::Max, Interval::Daily)
            .unwrap();

        assert_eq!(series.symbol(), "BHP");
        assert_eq!(series.len(), 3);
        let first = &series.bars()[0];
        assert_eq!(
            first.timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(first.open, 100.0);
        assert_eq!(first.high, 110.0);
        assert_eq!(first.low, 90.0);
        assert_eq!(first.close, 105.0);
        assert_eq!(first.volume, 50000);
    }

    #[test]
    fn interval_specific_file_with_datetimes() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter
            .fetch_series("BHP", Period::Days(5), Interval::Minutes(60))
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[1].timestamp.format("%H:%M").to_string(), "10:30");
    }

    #[test]
    fn trims_to_period() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter
            .fetch_series("BHP", Period::Days(1), Interval::Daily)
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.latest().unwrap().close, 115.0);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let err = adapter
            .fetch_series("XYZ", Period::Years(1), Interval::Daily)
            .unwrap_err();
        assert!(matches!(err, RankError::DataUnavailable { symbol, .. } if symbol == "XYZ"));
    }

    #[test]
    fn empty_file_is_unavailable() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let err = adapter
            .fetch_series("CBA", Period::Years(1), Interval::Daily)
            .unwrap_err();
        assert!(matches!(err, RankError::DataUnavailable { .. }));
    }

    #[test]
    fn duplicate_timestamps_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("DUP.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-15,1,1,1,1,10\n\
             2024-01-15,1,1,1,1,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());

        let err = adapter
            .fetch_series("DUP", Period::Max, Interval::Daily)
            .unwrap_err();
        assert!(matches!(err, RankError::InvalidSeries { .. }));
    }

    #[test]
    fn bad_value_names_the_column() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("BAD.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-15,1,1,1,abc,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());

        let err = adapter
            .fetch_series("BAD", Period::Max, Interval::Daily)
            .unwrap_err();
        assert!(matches!(err, RankError::InvalidSeries { reason, .. } if reason.contains("close")));
    }

    #[test]
    fn fetch_info_reads_metadata() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let info = adapter.fetch_info("bhp").unwrap();
        assert_eq!(info.market_cap, Some(150_000_000_000.0));
        assert_eq!(info.avg_volume, Some(7_500_000.0));
        assert_eq!(info.sector.as_deref(), Some("Materials"));

        assert_eq!(adapter.fetch_info("CBA").unwrap(), SymbolInfo::default());
        assert!(adapter.fetch_info("XYZ").is_err());
    }

    #[test]
    fn list_symbols_skips_info_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(adapter.list_symbols().unwrap(), vec!["BHP", "CBA"]);
    }

    #[test]
    fn period_start_caps_intraday_history() {
        let latest = NaiveDate::from_ymd_opt(2024, 6, 30)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap();
        let start = period_start(latest, Period::Years(1), Interval::Minutes(5)).unwrap();
        assert_eq!(latest - start, Duration::days(60));
        assert_eq!(period_start(latest, Period::Max, Interval::Daily), None);
        let ytd = period_start(latest, Period::YearToDate, Interval::Daily).unwrap();
        assert_eq!(ytd.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}

//! Sampling interval, history period and the adaptive minimum bar count.
//!
//! The minimum number of bars a symbol needs before it can be ranked depends
//! on how many bars the requested period can yield at the requested interval:
//!
//! - expected = trading days in period x bars per trading day
//! - intraday intervals are capped at 60 calendar days of history (7 for 1m),
//!   matching what market data providers serve
//! - minimum = 80% of expected, clamped to [`MIN_FLOOR`, `LONGEST_LOOKBACK`],
//!   and never more than the period can actually yield
//!
//! Indicators with a longer lookback than the minimum are left undefined and
//! lower the score instead of excluding the symbol.

use chrono::{Datelike, NaiveDate, Weekday};
use std::fmt;
use std::str::FromStr;

/// SMA(200) is the longest lookback in the snapshot.
pub const LONGEST_LOOKBACK: usize = 200;

/// SMA(20), Bollinger(20) and return volatility share the shortest full lookback.
pub const MIN_FLOOR: usize = 20;

/// Stand-in for year-to-date when no reference date is known.
const YTD_NOMINAL_TRADING_DAYS: f64 = 126.0;

const TRADING_MINUTES_PER_DAY: f64 = 390.0;
const INTRADAY_MAX_TRADING_DAYS: f64 = 42.0;
const MINUTE_MAX_TRADING_DAYS: f64 = 5.0;
const COVERAGE: f64 = 0.8;

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseIntervalError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Minutes(u32),
    Daily,
    FiveDay,
    Weekly,
    Monthly,
    Quarterly,
}

impl Interval {
    pub fn bars_per_trading_day(self) -> f64 {
        match self {
            Interval::Minutes(m) => TRADING_MINUTES_PER_DAY / m as f64,
            Interval::Daily => 1.0,
            Interval::FiveDay | Interval::Weekly => 1.0 / 5.0,
            Interval::Monthly => 1.0 / 21.0,
            Interval::Quarterly => 1.0 / 63.0,
        }
    }
}

impl FromStr for Interval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Interval::Minutes(1)),
            "2m" => Ok(Interval::Minutes(2)),
            "5m" => Ok(Interval::Minutes(5)),
            "15m" => Ok(Interval::Minutes(15)),
            "30m" => Ok(Interval::Minutes(30)),
            "60m" | "1h" => Ok(Interval::Minutes(60)),
            "90m" => Ok(Interval::Minutes(90)),
            "1d" => Ok(Interval::Daily),
            "5d" => Ok(Interval::FiveDay),
            "1wk" => Ok(Interval::Weekly),
            "1mo" => Ok(Interval::Monthly),
            "3mo" => Ok(Interval::Quarterly),
            other => Err(ParseIntervalError {
                kind: "interval",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Minutes(60) => write!(f, "1h"),
            Interval::Minutes(m) => write!(f, "{}m", m),
            Interval::Daily => write!(f, "1d"),
            Interval::FiveDay => write!(f, "5d"),
            Interval::Weekly => write!(f, "1wk"),
            Interval::Monthly => write!(f, "1mo"),
            Interval::Quarterly => write!(f, "3mo"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Days(u32),
    Months(u32),
    Years(u32),
    YearToDate,
    Max,
}

impl Period {
    /// Approximate number of trading days covered, `None` for unbounded.
    ///
    /// Year-to-date counts weekdays from January 1 through `as_of`, or half a
    /// year when no date is given.
    pub fn trading_days(self, as_of: Option<NaiveDate>) -> Option<f64> {
        match self {
            Period::Days(d) => Some(d as f64),
            Period::Months(m) => Some(m as f64 * 21.0),
            Period::Years(y) => Some(y as f64 * 252.0),
            Period::YearToDate => Some(
                as_of
                    .and_then(weekdays_year_to_date)
                    .unwrap_or(YTD_NOMINAL_TRADING_DAYS),
            ),
            Period::Max => None,
        }
    }
}

impl FromStr for Period {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(Period::Days(1)),
            "5d" => Ok(Period::Days(5)),
            "1mo" => Ok(Period::Months(1)),
            "3mo" => Ok(Period::Months(3)),
            "6mo" => Ok(Period::Months(6)),
            "1y" => Ok(Period::Years(1)),
            "2y" => Ok(Period::Years(2)),
            "5y" => Ok(Period::Years(5)),
            "10y" => Ok(Period::Years(10)),
            "ytd" => Ok(Period::YearToDate),
            "max" => Ok(Period::Max),
            other => Err(ParseIntervalError {
                kind: "period",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Days(d) => write!(f, "{}d", d),
            Period::Months(m) => write!(f, "{}mo", m),
            Period::Years(y) => write!(f, "{}y", y),
            Period::YearToDate => write!(f, "ytd"),
            Period::Max => write!(f, "max"),
        }
    }
}

fn weekdays_year_to_date(as_of: NaiveDate) -> Option<f64> {
    let first = NaiveDate::from_ymd_opt(as_of.year(), 1, 1)?;
    let days = first
        .iter_days()
        .take_while(|d| *d <= as_of)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count();
    Some(days as f64)
}

/// Bars the requested period can yield at this interval, `None` when unbounded.
///
/// `as_of` is the date of the latest bar; only year-to-date depends on it.
pub fn expected_bars(interval: Interval, period: Period, as_of: Option<NaiveDate>) -> Option<f64> {
    let cap = match interval {
        Interval::Minutes(1) => Some(MINUTE_MAX_TRADING_DAYS),
        Interval::Minutes(_) => Some(INTRADAY_MAX_TRADING_DAYS),
        _ => None,
    };
    let days = match (period.trading_days(as_of), cap) {
        (Some(d), Some(c)) => d.min(c),
        (Some(d), None) => d,
        (None, Some(c)) => c,
        (None, None) => return None,
    };
    Some(days * interval.bars_per_trading_day())
}

/// Adaptive minimum history a symbol needs to be ranked. Always at least one
/// bar and never more than the period can yield.
pub fn minimum_bars(interval: Interval, period: Period, as_of: Option<NaiveDate>) -> usize {
    match expected_bars(interval, period, as_of) {
        Some(expected) => {
            let covered = (expected * COVERAGE).floor() as usize;
            covered
                .clamp(MIN_FLOOR, LONGEST_LOOKBACK)
                .min(expected.floor() as usize)
                .max(1)
        }
        None => LONGEST_LOOKBACK,
    }
}

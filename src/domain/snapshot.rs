//! Latest-bar indicator snapshot.
//!
//! Everything downstream of the indicator layer (scoring, signals,
//! recommendations, filters) reads from an `IndicatorSnapshot` rather than
//! from the raw series. Each value is `None` when its lookback exceeds the
//! available history.

use crate::domain::indicator::{
    bollinger, calculate_bollinger, calculate_macd, calculate_return_volatility, calculate_roc,
    calculate_rsi, calculate_sma, calculate_volume_ratio, macd, rsi, volume_ratio,
    IndicatorValue,
};
use crate::domain::ohlcv::PriceSeries;
use chrono::NaiveDateTime;
use std::fmt;

pub const MOMENTUM_PERIOD: usize = 20;
pub const SHORT_MOMENTUM_PERIOD: usize = 5;
pub const MEDIUM_MOMENTUM_PERIOD: usize = 10;
pub const VOLATILITY_PERIOD: usize = 20;
pub const RECENT_LOW_PERIOD: usize = 20;

/// Named snapshot value; the vocabulary rules are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotField {
    Sma20,
    Sma50,
    Sma200,
    Rsi,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
    VolumeRatio,
    Momentum,
    ShortMomentum,
    MediumMomentum,
    Volatility,
    RecentLow,
}

impl SnapshotField {
    pub const ALL: [SnapshotField; 16] = [
        SnapshotField::Sma20,
        SnapshotField::Sma50,
        SnapshotField::Sma200,
        SnapshotField::Rsi,
        SnapshotField::MacdLine,
        SnapshotField::MacdSignal,
        SnapshotField::MacdHistogram,
        SnapshotField::BollingerUpper,
        SnapshotField::BollingerMiddle,
        SnapshotField::BollingerLower,
        SnapshotField::VolumeRatio,
        SnapshotField::Momentum,
        SnapshotField::ShortMomentum,
        SnapshotField::MediumMomentum,
        SnapshotField::Volatility,
        SnapshotField::RecentLow,
    ];

    /// Bars needed before the field is defined.
    pub fn required_bars(self) -> usize {
        match self {
            SnapshotField::Sma20 => 20,
            SnapshotField::Sma50 => 50,
            SnapshotField::Sma200 => 200,
            SnapshotField::Rsi => rsi::DEFAULT_PERIOD + 1,
            SnapshotField::MacdLine | SnapshotField::MacdSignal | SnapshotField::MacdHistogram => {
                macd::DEFAULT_SLOW + macd::DEFAULT_SIGNAL - 1
            }
            SnapshotField::BollingerUpper
            | SnapshotField::BollingerMiddle
            | SnapshotField::BollingerLower => bollinger::DEFAULT_PERIOD,
            SnapshotField::VolumeRatio => volume_ratio::DEFAULT_PERIOD,
            SnapshotField::Momentum => MOMENTUM_PERIOD + 1,
            SnapshotField::ShortMomentum => SHORT_MOMENTUM_PERIOD + 1,
            SnapshotField::MediumMomentum => MEDIUM_MOMENTUM_PERIOD + 1,
            SnapshotField::Volatility => VOLATILITY_PERIOD + 1,
            SnapshotField::RecentLow => RECENT_LOW_PERIOD,
        }
    }
}

impl fmt::Display for SnapshotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SnapshotField::Sma20 => "SMA(20)",
            SnapshotField::Sma50 => "SMA(50)",
            SnapshotField::Sma200 => "SMA(200)",
            SnapshotField::Rsi => "RSI(14)",
            SnapshotField::MacdLine => "MACD",
            SnapshotField::MacdSignal => "MACD signal",
            SnapshotField::MacdHistogram => "MACD histogram",
            SnapshotField::BollingerUpper => "BB upper",
            SnapshotField::BollingerMiddle => "BB middle",
            SnapshotField::BollingerLower => "BB lower",
            SnapshotField::VolumeRatio => "volume ratio",
            SnapshotField::Momentum => "momentum(20)",
            SnapshotField::ShortMomentum => "momentum(5)",
            SnapshotField::MediumMomentum => "momentum(10)",
            SnapshotField::Volatility => "volatility(20)",
            SnapshotField::RecentLow => "20-bar low",
        };
        f.write_str(name)
    }
}

/// Warning attached to a breakdown when an indicator lacks history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorUndefined {
    pub field: SnapshotField,
    pub required: usize,
    pub available: usize,
}

impl fmt::Display for IndicatorUndefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} undefined: needs {} bars, have {}",
            self.field, self.required, self.available
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub volume: i64,
    pub bars: usize,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub prev_macd_line: Option<f64>,
    pub prev_macd_signal: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub momentum: Option<f64>,
    pub short_momentum: Option<f64>,
    pub medium_momentum: Option<f64>,
    pub volatility: Option<f64>,
    pub recent_low: Option<f64>,
}

impl IndicatorSnapshot {
    /// Compute every indicator over `series` and keep the latest values.
    ///
    /// Returns `None` for an empty series.
    pub fn from_series(series: &PriceSeries) -> Option<Self> {
        let bars = series.bars();
        let last = series.latest()?;

        let macd_series = calculate_macd(
            bars,
            macd::DEFAULT_FAST,
            macd::DEFAULT_SLOW,
            macd::DEFAULT_SIGNAL,
        );
        let (macd_line, macd_signal, macd_histogram) = match macd_series.latest() {
            Some(IndicatorValue::Macd {
                line,
                signal,
                histogram,
            }) => (Some(line), Some(signal), Some(histogram)),
            _ => (None, None, None),
        };
        let (prev_macd_line, prev_macd_signal) = match macd_series.previous() {
            Some(IndicatorValue::Macd { line, signal, .. }) => (Some(line), Some(signal)),
            _ => (None, None),
        };

        let bands = calculate_bollinger(
            bars,
            bollinger::DEFAULT_PERIOD,
            bollinger::DEFAULT_MULT_X100,
        );
        let (bb_upper, bb_middle, bb_lower) = match bands.latest() {
            Some(IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            }) => (Some(upper), Some(middle), Some(lower)),
            _ => (None, None, None),
        };

        let recent_low = (bars.len() >= RECENT_LOW_PERIOD).then(|| {
            bars[bars.len() - RECENT_LOW_PERIOD..]
                .iter()
                .map(|b| b.low)
                .fold(f64::INFINITY, f64::min)
        });

        Some(Self {
            timestamp: last.timestamp,
            close: last.close,
            volume: last.volume,
            bars: bars.len(),
            sma20: calculate_sma(bars, 20).latest_simple(),
            sma50: calculate_sma(bars, 50).latest_simple(),
            sma200: calculate_sma(bars, 200).latest_simple(),
            rsi: calculate_rsi(bars, rsi::DEFAULT_PERIOD).latest_simple(),
            macd_line,
            macd_signal,
            macd_histogram,
            prev_macd_line,
            prev_macd_signal,
            bb_upper,
            bb_middle,
            bb_lower,
            volume_ratio: calculate_volume_ratio(bars, volume_ratio::DEFAULT_PERIOD)
                .latest_simple(),
            momentum: calculate_roc(bars, MOMENTUM_PERIOD).latest_simple(),
            short_momentum: calculate_roc(bars, SHORT_MOMENTUM_PERIOD).latest_simple(),
            medium_momentum: calculate_roc(bars, MEDIUM_MOMENTUM_PERIOD).latest_simple(),
            volatility: calculate_return_volatility(bars, VOLATILITY_PERIOD).latest_simple(),
            recent_low,
        })
    }

    pub fn get(&self, field: SnapshotField) -> Option<f64> {
        match field {
            SnapshotField::Sma20 => self.sma20,
            SnapshotField::Sma50 => self.sma50,
            SnapshotField::Sma200 => self.sma200,
            SnapshotField::Rsi => self.rsi,
            SnapshotField::MacdLine => self.macd_line,
            SnapshotField::MacdSignal => self.macd_signal,
            SnapshotField::MacdHistogram => self.macd_histogram,
            SnapshotField::BollingerUpper => self.bb_upper,
            SnapshotField::BollingerMiddle => self.bb_middle,
            SnapshotField::BollingerLower => self.bb_lower,
            SnapshotField::VolumeRatio => self.volume_ratio,
            SnapshotField::Momentum => self.momentum,
            SnapshotField::ShortMomentum => self.short_momentum,
            SnapshotField::MediumMomentum => self.medium_momentum,
            SnapshotField::Volatility => self.volatility,
            SnapshotField::RecentLow => self.recent_low,
        }
    }

    /// Value one bar earlier; only the MACD pair keeps history.
    pub fn previous(&self, field: SnapshotField) -> Option<f64> {
        match field {
            SnapshotField::MacdLine => self.prev_macd_line,
            SnapshotField::MacdSignal => self.prev_macd_signal,
            _ => None,
        }
    }

    pub fn undefined(&self) -> Vec<IndicatorUndefined> {
        SnapshotField::ALL
            .iter()
            .filter(|f| self.get(**f).is_none())
            .map(|f| IndicatorUndefined {
                field: *f,
                required: f.required_bars(),
                available: self.bars,
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        SnapshotField::ALL.iter().all(|f| self.get(*f).is_some())
    }
}

#[cfg(test)]
pub(crate) mod test_snapshot {
    use super::IndicatorSnapshot;
    use chrono::NaiveDate;

    /// Snapshot with every indicator undefined.
    pub fn bare(close: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            close,
            volume: 1_000_000,
            bars: 0,
            sma20: None,
            sma50: None,
            sma200: None,
            rsi: None,
            macd_line: None,
            macd_signal: None,
            macd_histogram: None,
            prev_macd_line: None,
            prev_macd_signal: None,
            bb_upper: None,
            bb_middle: None,
            bb_lower: None,
            volume_ratio: None,
            momentum: None,
            short_momentum: None,
            medium_momentum: None,
            volatility: None,
            recent_low: None,
        }
    }
}

//! OHLCV bars and the validated price series handed to the core.

use crate::domain::error::RankError;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Time-ordered bars for one symbol.
///
/// Timestamps are strictly increasing; the core only ever reads from it.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, RankError> {
        let symbol = symbol.into();
        for pair in bars.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(RankError::InvalidSeries {
                    symbol,
                    reason: format!(
                        "timestamp {} does not follow {}",
                        pair[1].timestamp, pair[0].timestamp
                    ),
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn latest(&self) -> Option<&OhlcvBar> {
        self.bars.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn accepts_increasing_timestamps() {
        let series = PriceSeries::new("AAPL", vec![bar(1, 10.0), bar(2, 11.0), bar(3, 12.0)]).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.symbol(), "AAPL");
        assert!((series.latest().unwrap().close - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_duplicate_timestamp() {
        let result = PriceSeries::new("AAPL", vec![bar(1, 10.0), bar(1, 11.0)]);
        assert!(matches!(result, Err(RankError::InvalidSeries { .. })));
    }

    #[test]
    fn rejects_out_of_order() {
        let result = PriceSeries::new("AAPL", vec![bar(2, 10.0), bar(1, 11.0)]);
        assert!(matches!(result, Err(RankError::InvalidSeries { .. })));
    }

    #[test]
    fn empty_series_is_valid() {
        let series = PriceSeries::new("AAPL", vec![]).unwrap();
        assert!(series.is_empty());
        assert!(series.latest().is_none());
    }
}

//! ROC (Rate of Change) indicator, expressed in percent.
//!
//! ROC(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100
//! If C[i-n] == 0 the point is undefined.
//! Warmup: first n bars undefined.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_roc(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let prev_close = match i.checked_sub(period) {
                Some(j) if period > 0 => bars[j].close,
                _ => return IndicatorPoint::undefined(bar.timestamp),
            };
            if prev_close == 0.0 {
                IndicatorPoint::undefined(bar.timestamp)
            } else {
                IndicatorPoint::simple(
                    bar.timestamp,
                    ((bar.close - prev_close) / prev_close) * 100.0,
                )
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Roc(period),
        values,
    }
}

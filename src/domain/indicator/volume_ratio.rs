//! Volume ratio: current volume over the mean volume of the last n bars
//! (the current bar included).
//!
//! Undefined during warmup and when the average volume is zero.

use crate::domain::indicator::sma::rolling_mean;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 20;

pub fn calculate_volume_ratio(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
    let values = rolling_mean(&volumes, period)
        .into_iter()
        .zip(bars)
        .map(|(avg, bar)| match avg {
            Some(avg) if avg > 0.0 => IndicatorPoint::simple(bar.timestamp, bar.volume as f64 / avg),
            _ => IndicatorPoint::undefined(bar.timestamp),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::VolumeRatio(period),
        values,
    }
}

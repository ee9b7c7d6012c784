//! Return volatility: sample standard deviation (N-1) of the last n
//! bar-over-bar returns, as a fraction. Needs n + 1 bars.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_return_volatility(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    // returns[i] is the change into bar i; None for the first bar or a zero base
    let returns: Vec<Option<f64>> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let prev = bars.get(i.checked_sub(1)?)?.close;
            (prev != 0.0).then(|| bar.close / prev - 1.0)
        })
        .collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period < 2 || i < period {
                return IndicatorPoint::undefined(bar.timestamp);
            }
            let window: Option<Vec<f64>> = returns[i + 1 - period..=i].iter().copied().collect();
            match window {
                Some(w) => {
                    let (_, stddev) = window_mean_stddev(&w, 1);
                    IndicatorPoint::simple(bar.timestamp, stddev)
                }
                None => IndicatorPoint::undefined(bar.timestamp),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Volatility(period),
        values,
    }
}

/// Mean and standard deviation of a window with `ddof` delta degrees of freedom.
pub(crate) fn window_mean_stddev(window: &[f64], ddof: usize) -> (f64, f64) {
    let n = window.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = window.iter().sum::<f64>() / n as f64;
    if n <= ddof {
        return (mean, 0.0);
    }
    let variance = window
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - ddof) as f64;
    (mean, variance.sqrt())
}

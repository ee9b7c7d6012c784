//! Exponential moving average, the building block of MACD.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) values are undefined.

/// EMA over raw values that may start with an undefined prefix.
///
/// The seed is the mean of the first `period` defined values.
pub(crate) fn ema_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    ema_over(values.iter().map(|v| Some(*v)), values.len(), period)
}

pub(crate) fn ema_over<I>(values: I, len: usize, period: usize) -> Vec<Option<f64>>
where
    I: Iterator<Item = Option<f64>>,
{
    let mut out = Vec::with_capacity(len);
    if period == 0 {
        out.resize(len, None);
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut seen = 0usize;
    let mut sum = 0.0;
    let mut ema = 0.0;

    for value in values {
        let Some(v) = value else {
            out.push(None);
            continue;
        };
        seen += 1;
        if seen < period {
            sum += v;
            out.push(None);
        } else if seen == period {
            sum += v;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = v * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }
    out
}

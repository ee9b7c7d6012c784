#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
pub use stockrank::domain::ohlcv::{OhlcvBar, PriceSeries};
use stockrank::domain::error::RankError;
use stockrank::domain::interval::{Interval, Period};
use stockrank::domain::universe::RankConfig;
use stockrank::ports::data_port::{DataPort, SymbolInfo};
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub info: HashMap<String, SymbolInfo>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            info: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_info(mut self, symbol: &str, info: SymbolInfo) -> Self {
        self.info.insert(symbol.to_string(), info);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(
        &self,
        symbol: &str,
        _period: Period,
        _interval: Interval,
    ) -> Result<PriceSeries, RankError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RankError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        let bars = self
            .data
            .get(symbol)
            .cloned()
            .ok_or_else(|| RankError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "unknown symbol".to_string(),
            })?;
        PriceSeries::new(symbol, bars)
    }

    fn fetch_info(&self, symbol: &str) -> Result<SymbolInfo, RankError> {
        self.info
            .get(symbol)
            .cloned()
            .ok_or_else(|| RankError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no metadata".to_string(),
            })
    }
}

/// Daily bars from 2023-01-02 with a 1% high/low spread around each close.
pub fn make_bars(closes: &[f64], volumes: &[i64]) -> Vec<OhlcvBar> {
    assert_eq!(closes.len(), volumes.len());
    let start = NaiveDate::from_ymd_opt(2023, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| OhlcvBar {
            timestamp: start + Duration::days(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume,
        })
        .collect()
}

/// Alternating -2.3% / +2.7% moves, ending on an up move when `n` is even.
pub fn zigzag(n: usize, start: f64) -> Vec<f64> {
    let mut price = start;
    (0..n)
        .map(|i| {
            price *= if i % 2 == 1 { 1.027 } else { 0.977 };
            price
        })
        .collect()
}

pub fn flat_volume(n: usize) -> Vec<i64> {
    vec![1_000_000; n]
}

/// 220-bar rising zigzag with the last bar on double volume.
pub fn uptrend_bars() -> Vec<OhlcvBar> {
    let mut volumes = flat_volume(220);
    volumes[219] = 2_000_000;
    make_bars(&zigzag(220, 50.0), &volumes)
}

/// Steady slide: 0.5% lower every bar.
pub fn downtrend_bars(n: usize) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..n).map(|i| 100.0 * 0.995f64.powi(i as i32)).collect();
    make_bars(&closes, &flat_volume(n))
}

pub fn large_cap() -> SymbolInfo {
    SymbolInfo {
        market_cap: Some(200_000_000_000.0),
        avg_volume: Some(5_000_000.0),
        sector: Some("Technology".to_string()),
    }
}

/// Default strategy, but with filters wide enough that only history and
/// data errors exclude anything.
pub fn open_config() -> RankConfig {
    let mut config = RankConfig {
        workers: 4,
        ..RankConfig::default()
    };
    let p = &mut config.profile;
    p.min_market_cap = 0.0;
    p.min_volume = 0.0;
    p.min_price = 0.0;
    p.max_price = 1.0e9;
    p.min_rsi = 0.0;
    p.max_rsi = 100.0;
    p.min_volume_ratio = 0.0;
    p.max_volatility = 1.0;
    config.max_below_sma20 = 0.99;
    config
}

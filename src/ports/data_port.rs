//! Market data access port trait.

use crate::domain::error::RankError;
use crate::domain::interval::{Interval, Period};
use crate::domain::ohlcv::PriceSeries;

/// Descriptive metadata for a symbol. Any field may be unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolInfo {
    pub market_cap: Option<f64>,
    pub avg_volume: Option<f64>,
    pub sector: Option<String>,
}

/// Source of price history and metadata.
///
/// Implementations must be shareable across the ranker's worker threads.
/// Failures are returned as errors, never as empty or zero-filled series.
pub trait DataPort: Sync {
    fn fetch_series(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries, RankError>;

    fn fetch_info(&self, symbol: &str) -> Result<SymbolInfo, RankError>;
}

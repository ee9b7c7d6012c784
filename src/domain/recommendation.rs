//! Entry-price recommendation.
//!
//! Support is the highest of SMA20, SMA50, the lower Bollinger band and the
//! recent low that sits at or just under the price. The suggested entry is
//! support scaled by the strategy multiplier and an RSI timing factor; the
//! range is a volatility-scaled band around it. Confidence, risk and horizon
//! are read from threshold tables.

use crate::domain::rule::{Operand, Rule};
use crate::domain::rule_eval::{EvalContext, ThresholdTable};
use crate::domain::scoring::ScoreBreakdown;
use crate::domain::signal::Signal;
use crate::domain::snapshot::{IndicatorSnapshot, SnapshotField};
use crate::domain::strategy::StrategyProfile;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    /// One step up, saturating at `High`.
    pub fn raised(self) -> Self {
        match self {
            Level::Low => Level::Medium,
            Level::Medium | Level::High => Level::High,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "LOW"),
            Level::Medium => write!(f, "MEDIUM"),
            Level::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeHorizon {
    ShortToMedium,
    Medium,
    Long,
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeHorizon::ShortToMedium => write!(f, "Short to Medium-term"),
            TimeHorizon::Medium => write!(f, "Medium-term"),
            TimeHorizon::Long => write!(f, "Long-term"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub low: f64,
    pub high: f64,
}

impl PriceRange {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub entry_price: f64,
    pub range: PriceRange,
    pub support: f64,
    pub confidence: Level,
    pub risk: Level,
    pub horizon: TimeHorizon,
    pub rationale: String,
    /// Suggested share count when a portfolio value was supplied.
    pub shares: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationConfig {
    /// Support candidates may sit this far above the price.
    pub support_tolerance: f64,
    pub rsi_sensitivity: f64,
    pub timing_min: f64,
    pub timing_max: f64,
    /// Range half-width = clamp(volatility * band_k, band_min, band_max).
    pub band_k: f64,
    pub band_min: f64,
    pub band_max: f64,
    pub default_band: f64,
    pub confidence_medium: f64,
    pub confidence_high: f64,
    pub volume_bonus: f64,
    pub agreement_bonus: f64,
    pub risk_medium_volatility: f64,
    pub risk_high_volatility: f64,
    pub small_cap_threshold: f64,
    pub short_horizon_momentum: f64,
    pub min_position_pct: f64,
    pub max_position_pct: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            support_tolerance: 0.02,
            rsi_sensitivity: 0.05,
            timing_min: 0.9,
            timing_max: 1.1,
            band_k: 1.5,
            band_min: 0.01,
            band_max: 0.08,
            default_band: 0.03,
            confidence_medium: 50.0,
            confidence_high: 75.0,
            volume_bonus: 5.0,
            agreement_bonus: 2.5,
            risk_medium_volatility: 0.025,
            risk_high_volatility: 0.04,
            small_cap_threshold: 10_000_000_000.0,
            short_horizon_momentum: 5.0,
            min_position_pct: 0.02,
            max_position_pct: 0.10,
        }
    }
}

/// Everything one recommendation is derived from.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationInput<'a> {
    pub snapshot: &'a IndicatorSnapshot,
    pub breakdown: &'a ScoreBreakdown,
    pub signal: &'a Signal,
    pub profile: &'a StrategyProfile,
    pub market_cap: Option<f64>,
    pub portfolio_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationEngine {
    config: RecommendationConfig,
    confidence: ThresholdTable<Level>,
    risk: ThresholdTable<Level>,
    horizon: ThresholdTable<TimeHorizon>,
}

impl RecommendationEngine {
    pub fn new(config: RecommendationConfig) -> Self {
        let volatility = || Operand::field(SnapshotField::Volatility);
        let momentum = || Operand::field(SnapshotField::Momentum);

        let confidence = ThresholdTable::new(
            vec![
                (
                    Rule::above(Operand::Score, Operand::Constant(config.confidence_high)),
                    Level::High,
                ),
                (
                    Rule::at_least(Operand::Score, Operand::Constant(config.confidence_medium)),
                    Level::Medium,
                ),
            ],
            Level::Low,
        );
        // undefined volatility falls through to MEDIUM
        let risk = ThresholdTable::new(
            vec![
                (
                    Rule::above(volatility(), Operand::Constant(config.risk_high_volatility)),
                    Level::High,
                ),
                (
                    Rule::above(volatility(), Operand::Constant(config.risk_medium_volatility)),
                    Level::Medium,
                ),
                (Rule::at_least(volatility(), Operand::Constant(0.0)), Level::Low),
            ],
            Level::Medium,
        );
        let horizon = ThresholdTable::new(
            vec![
                (
                    Rule::above(momentum(), Operand::Constant(config.short_horizon_momentum)),
                    TimeHorizon::ShortToMedium,
                ),
                (
                    Rule::above(momentum(), Operand::Constant(0.0)),
                    TimeHorizon::Medium,
                ),
            ],
            TimeHorizon::Long,
        );

        Self {
            config,
            confidence,
            risk,
            horizon,
        }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub fn recommend(&self, input: &RecommendationInput<'_>) -> Recommendation {
        let snap = input.snapshot;
        let cfg = &self.config;
        let price = snap.close;

        let (support, support_source) = self.support(snap);
        let timing = self.timing_factor(snap.rsi);
        let entry_price = support * input.profile.entry_multiplier * timing;
        let range = self.range(entry_price, snap.volatility);

        let confidence_points = input.breakdown.composite()
            + snap
                .volume_ratio
                .filter(|vr| *vr > 1.0)
                .map_or(0.0, |_| cfg.volume_bonus)
            + cfg.agreement_bonus * input.signal.confirmations as f64;
        let score_ctx = EvalContext::new(snap).with_score(confidence_points);
        let confidence = if snap.is_complete() {
            *self.confidence.evaluate(&score_ctx).outcome
        } else {
            Level::Low
        };

        let ctx = EvalContext::new(snap);
        let mut risk = *self.risk.evaluate(&ctx).outcome;
        if input
            .market_cap
            .is_some_and(|cap| cap < cfg.small_cap_threshold)
        {
            risk = risk.raised();
        }
        let horizon = *self.horizon.evaluate(&ctx).outcome;

        let shares = input
            .portfolio_value
            .and_then(|value| self.position_size(value, price, input.breakdown.composite()));

        let mut rationale = format!(
            "{} ({}): support {:.2} from {}, strategy x{:.3}, RSI timing x{:.3}; \
             score {:.1}, {} confirmation(s), volatility {}",
            input.signal.kind,
            input.profile.kind,
            support,
            support_source,
            input.profile.entry_multiplier,
            timing,
            input.breakdown.composite(),
            input.signal.confirmations,
            snap.volatility
                .map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0)),
        );
        if input.breakdown.is_partial() {
            rationale.push_str("; partial indicator data");
        }

        Recommendation {
            entry_price,
            range,
            support,
            confidence,
            risk,
            horizon,
            rationale,
            shares,
        }
    }

    /// Highest defined candidate at or below `price * (1 + tolerance)`;
    /// the price itself when none qualifies.
    fn support(&self, snap: &IndicatorSnapshot) -> (f64, &'static str) {
        let ceiling = snap.close * (1.0 + self.config.support_tolerance);
        [
            (snap.sma20, "SMA(20)"),
            (snap.sma50, "SMA(50)"),
            (snap.bb_lower, "BB lower"),
            (snap.recent_low, "20-bar low"),
        ]
        .into_iter()
        .filter_map(|(value, name)| value.map(|v| (v, name)))
        .filter(|(v, _)| *v > 0.0 && *v <= ceiling)
        .fold(None, |best: Option<(f64, &'static str)>, cand| match best {
            Some(b) if b.0 >= cand.0 => Some(b),
            _ => Some(cand),
        })
        .unwrap_or((snap.close, "current price"))
    }

    fn timing_factor(&self, rsi: Option<f64>) -> f64 {
        match rsi {
            Some(rsi) => (1.0 + self.config.rsi_sensitivity * (rsi - 50.0) / 50.0)
                .clamp(self.config.timing_min, self.config.timing_max),
            None => 1.0,
        }
    }

    fn range(&self, entry: f64, volatility: Option<f64>) -> PriceRange {
        let cfg = &self.config;
        let band = volatility
            .map(|v| (v * cfg.band_k).clamp(cfg.band_min, cfg.band_max))
            .unwrap_or(cfg.default_band);
        let a = entry * (1.0 - band);
        let b = entry * (1.0 + band);
        PriceRange {
            low: a.min(b).min(entry),
            high: a.max(b).max(entry),
        }
    }

    /// `floor(value * pct / price)` with pct interpolated by score.
    pub fn position_size(&self, portfolio_value: f64, price: f64, score: f64) -> Option<u64> {
        if price <= 0.0 || portfolio_value <= 0.0 {
            return None;
        }
        let cfg = &self.config;
        let pct = cfg.min_position_pct
            + (cfg.max_position_pct - cfg.min_position_pct) * (score.clamp(0.0, 100.0) / 100.0);
        Some((portfolio_value * pct / price).floor() as u64)
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new(RecommendationConfig::default())
    }
}

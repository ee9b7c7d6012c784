//! Universe ranking.
//!
//! Every symbol runs the same pure pipeline (snapshot, score, signal,
//! recommendation) on a private worker pool. Symbols that cannot be fetched,
//! lack history, or fail a pre-filter are recorded as exclusions; one
//! symbol's failure never aborts the batch. The only cross-symbol step is the
//! final sort.

use crate::domain::error::RankError;
use crate::domain::indicator::volume_ratio;
use crate::domain::interval::{minimum_bars, Interval, Period};
use crate::domain::ohlcv::PriceSeries;
use crate::domain::recommendation::{
    Recommendation, RecommendationConfig, RecommendationEngine, RecommendationInput,
};
use crate::domain::rule::{Operand, Rule};
use crate::domain::rule_eval::{describe, evaluate, EvalContext};
use crate::domain::scoring::{ScoreBreakdown, ScoringModel};
use crate::domain::signal::{Position, Signal, SignalConfig, SignalGenerator, SignalKind};
use crate::domain::snapshot::{IndicatorSnapshot, SnapshotField};
use crate::domain::strategy::StrategyProfile;
use crate::ports::data_port::{DataPort, SymbolInfo};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Largest drop below SMA(20) a symbol may show and still qualify.
pub const DEFAULT_MAX_BELOW_SMA20: f64 = 0.10;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Split a comma-separated symbol list, uppercasing each entry.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Everything one ranking pass needs, passed explicitly to the ranker.
#[derive(Debug, Clone, PartialEq)]
pub struct RankConfig {
    pub profile: StrategyProfile,
    pub signal: SignalConfig,
    pub recommendation: RecommendationConfig,
    pub interval: Interval,
    pub period: Period,
    pub workers: usize,
    pub top: Option<usize>,
    /// Replaces the adaptive minimum history when set.
    pub min_data_points: Option<usize>,
    pub max_below_sma20: f64,
    pub portfolio_value: Option<f64>,
}

impl RankConfig {
    /// Minimum history before any data is seen; year-to-date is nominal here.
    pub fn minimum_bars(&self) -> usize {
        self.min_data_points
            .unwrap_or_else(|| minimum_bars(self.interval, self.period, None))
    }

    /// Minimum history for `series`, dated by its latest bar.
    pub fn minimum_bars_for(&self, series: &PriceSeries) -> usize {
        let as_of = series.latest().map(|bar| bar.timestamp.date());
        self.min_data_points
            .unwrap_or_else(|| minimum_bars(self.interval, self.period, as_of))
    }
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            profile: StrategyProfile::default(),
            signal: SignalConfig::default(),
            recommendation: RecommendationConfig::default(),
            interval: Interval::Daily,
            period: Period::Years(1),
            workers: default_workers(),
            top: None,
            min_data_points: None,
            max_below_sma20: DEFAULT_MAX_BELOW_SMA20,
            portfolio_value: None,
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    DataUnavailable(String),
    DataInsufficient { bars: usize, minimum: usize },
    Filtered(String),
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::DataUnavailable(reason) => write!(f, "data unavailable: {}", reason),
            ExclusionReason::DataInsufficient { bars, minimum } => {
                write!(f, "insufficient history: {} bars, need {}", bars, minimum)
            }
            ExclusionReason::Filtered(reason) => write!(f, "filtered: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub symbol: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone)]
pub struct RankedSymbol {
    pub symbol: String,
    pub snapshot: IndicatorSnapshot,
    pub breakdown: ScoreBreakdown,
    pub signal: Signal,
    pub recommendation: Recommendation,
    pub info: SymbolInfo,
}

impl RankedSymbol {
    pub fn score(&self) -> f64 {
        self.breakdown.composite()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RankingReport {
    /// Best first.
    pub ranked: Vec<RankedSymbol>,
    pub excluded: Vec<Exclusion>,
    pub evaluated: usize,
    /// Symbols that passed every check, counted before any top-N cut.
    pub qualified: usize,
    /// Aggregate view of every qualified symbol; `None` when none qualified.
    pub summary: Option<BatchSummary>,
}

const EXCEPTIONAL_SCORE: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    ModeratelyBullish,
    Neutral,
    Cautious,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Bullish => write!(f, "bullish"),
            Sentiment::ModeratelyBullish => write!(f, "moderately bullish"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Cautious => write!(f, "cautious"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub count: usize,
    pub average_score: f64,
    pub buy_count: usize,
    /// Scores of 80 and above.
    pub exceptional_count: usize,
    /// Most common known sector with its count; ties go to the first name.
    pub dominant_sector: Option<(String, usize)>,
    /// Fraction whose volatility exceeds the high-risk breakpoint.
    pub high_volatility_share: f64,
    pub sentiment: Sentiment,
}

impl BatchSummary {
    pub fn from_ranked(ranked: &[RankedSymbol], high_volatility: f64) -> Option<Self> {
        Self::aggregate(
            ranked.iter().map(|r| {
                (
                    r.score(),
                    r.signal.kind,
                    r.info.sector.as_deref(),
                    r.snapshot.volatility,
                )
            }),
            high_volatility,
        )
    }

    fn aggregate<'a>(
        items: impl Iterator<Item = (f64, SignalKind, Option<&'a str>, Option<f64>)>,
        high_volatility: f64,
    ) -> Option<Self> {
        let mut count = 0;
        let mut total = 0.0;
        let mut buy_count = 0;
        let mut exceptional_count = 0;
        let mut volatile = 0;
        let mut sectors: BTreeMap<&str, usize> = BTreeMap::new();

        for (score, kind, sector, volatility) in items {
            count += 1;
            total += score;
            if kind == SignalKind::Buy {
                buy_count += 1;
            }
            if score >= EXCEPTIONAL_SCORE {
                exceptional_count += 1;
            }
            if volatility.is_some_and(|v| v > high_volatility) {
                volatile += 1;
            }
            if let Some(name) = sector {
                *sectors.entry(name).or_default() += 1;
            }
        }
        if count == 0 {
            return None;
        }

        let mut dominant_sector: Option<(String, usize)> = None;
        for (name, n) in sectors {
            if dominant_sector.as_ref().is_none_or(|(_, best)| n > *best) {
                dominant_sector = Some((name.to_string(), n));
            }
        }

        let average_score = total / count as f64;
        let buy_share = buy_count as f64 / count as f64;
        let sentiment = if average_score >= 80.0 && buy_share > 0.5 {
            Sentiment::Bullish
        } else if average_score >= 70.0 && buy_share > 0.3 {
            Sentiment::ModeratelyBullish
        } else if average_score >= 60.0 {
            Sentiment::Neutral
        } else {
            Sentiment::Cautious
        };

        Some(Self {
            count,
            average_score,
            buy_count,
            exceptional_count,
            dominant_sector,
            high_volatility_share: volatile as f64 / count as f64,
            sentiment,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    label: &'static str,
    rule: Rule,
}

fn snapshot_filters(profile: &StrategyProfile, max_below_sma20: f64) -> Vec<Filter> {
    let field = Operand::field;
    vec![
        Filter {
            label: "price outside bounds",
            rule: Rule::between(Operand::Price, profile.min_price, profile.max_price),
        },
        Filter {
            label: "RSI outside band",
            rule: Rule::between(field(SnapshotField::Rsi), profile.min_rsi, profile.max_rsi),
        },
        Filter {
            label: "volume ratio too low",
            rule: Rule::at_least(
                field(SnapshotField::VolumeRatio),
                Operand::Constant(profile.min_volume_ratio),
            ),
        },
        Filter {
            label: "volatility outside band",
            rule: Rule::between(
                field(SnapshotField::Volatility),
                profile.min_volatility,
                profile.max_volatility,
            ),
        },
        Filter {
            label: "too far below SMA(20)",
            rule: Rule::at_least(
                Operand::relative(Operand::Price, field(SnapshotField::Sma20)),
                Operand::Constant(-max_below_sma20),
            ),
        },
    ]
}

fn average_volume(series: &PriceSeries) -> Option<f64> {
    let recent = &series.bars()[series.len().saturating_sub(volume_ratio::DEFAULT_PERIOD)..];
    if recent.is_empty() {
        return None;
    }
    Some(recent.iter().map(|b| b.volume as f64).sum::<f64>() / recent.len() as f64)
}

/// The per-symbol pipeline, built once per pass and shared by every worker.
#[derive(Debug, Clone)]
pub struct Ranker {
    config: RankConfig,
    scoring: ScoringModel,
    signals: SignalGenerator,
    recommender: RecommendationEngine,
    filters: Vec<Filter>,
}

impl Ranker {
    pub fn new(config: RankConfig) -> Self {
        let signals = SignalGenerator::new(&config.signal);
        let recommender = RecommendationEngine::new(config.recommendation.clone());
        let filters = snapshot_filters(&config.profile, config.max_below_sma20);
        Self {
            config,
            scoring: ScoringModel::default(),
            signals,
            recommender,
            filters,
        }
    }

    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    /// Run the pipeline for one already-fetched symbol.
    ///
    /// Unknown market cap or average volume skips that filter; an undefined
    /// indicator never fails a filter on its own.
    pub fn evaluate(
        &self,
        series: &PriceSeries,
        info: &SymbolInfo,
        position: Option<&Position>,
    ) -> Result<RankedSymbol, ExclusionReason> {
        let minimum = self.config.minimum_bars_for(series).max(1);
        if series.len() < minimum {
            return Err(ExclusionReason::DataInsufficient {
                bars: series.len(),
                minimum,
            });
        }
        let snapshot =
            IndicatorSnapshot::from_series(series).ok_or(ExclusionReason::DataInsufficient {
                bars: 0,
                minimum,
            })?;

        let profile = &self.config.profile;
        if let Some(cap) = info.market_cap {
            if cap < profile.min_market_cap {
                return Err(ExclusionReason::Filtered(format!(
                    "market cap {:.0} below {:.0}",
                    cap, profile.min_market_cap
                )));
            }
        }
        if let Some(volume) = info.avg_volume.or_else(|| average_volume(series)) {
            if volume < profile.min_volume {
                return Err(ExclusionReason::Filtered(format!(
                    "average volume {:.0} below {:.0}",
                    volume, profile.min_volume
                )));
            }
        }

        let ctx = EvalContext::new(&snapshot);
        if let Some(failed) = self
            .filters
            .iter()
            .find(|f| evaluate(&f.rule, &ctx) == Some(false))
        {
            return Err(ExclusionReason::Filtered(format!(
                "{}: {}",
                failed.label,
                describe(&failed.rule, &ctx)
            )));
        }

        let breakdown = self.scoring.score(&snapshot);
        let signal = self.signals.generate(&snapshot, &breakdown, position);
        let recommendation = self.recommender.recommend(&RecommendationInput {
            snapshot: &snapshot,
            breakdown: &breakdown,
            signal: &signal,
            profile,
            market_cap: info.market_cap,
            portfolio_value: self.config.portfolio_value,
        });

        Ok(RankedSymbol {
            symbol: series.symbol().to_string(),
            snapshot,
            breakdown,
            signal,
            recommendation,
            info: info.clone(),
        })
    }

    fn process(
        &self,
        data: &dyn DataPort,
        symbol: &str,
        position: Option<&Position>,
    ) -> Result<RankedSymbol, ExclusionReason> {
        let series = data
            .fetch_series(symbol, self.config.period, self.config.interval)
            .map_err(|e| ExclusionReason::DataUnavailable(e.to_string()))?;
        let info = data.fetch_info(symbol).unwrap_or_else(|e| {
            debug!(symbol, error = %e, "no metadata, skipping metadata filters");
            SymbolInfo::default()
        });
        self.evaluate(&series, &info, position)
    }

    /// Rank `symbols`, best composite score first.
    ///
    /// Only a failure to start the worker pool is an error; everything that
    /// goes wrong for an individual symbol ends up in `excluded`.
    pub fn rank(
        &self,
        data: &dyn DataPort,
        symbols: &[String],
        positions: &HashMap<String, Position>,
    ) -> Result<RankingReport, RankError> {
        info!(
            symbols = symbols.len(),
            strategy = %self.config.profile.kind,
            workers = self.config.workers,
            minimum_bars = self.config.minimum_bars(),
            "ranking universe"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| RankError::Io(std::io::Error::other(e)))?;

        let outcomes: Vec<(String, Result<RankedSymbol, ExclusionReason>)> = pool.install(|| {
            symbols
                .par_iter()
                .map(|symbol| {
                    let outcome = self.process(data, symbol, positions.get(symbol));
                    (symbol.clone(), outcome)
                })
                .collect()
        });

        let mut ranked = Vec::new();
        let mut excluded = Vec::new();
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(entry) => {
                    debug!(
                        symbol = %symbol,
                        score = entry.score(),
                        signal = %entry.signal.kind,
                        "qualified"
                    );
                    ranked.push(entry);
                }
                Err(reason) => {
                    match &reason {
                        ExclusionReason::Filtered(_) => debug!(symbol = %symbol, %reason, "excluded"),
                        _ => warn!(symbol = %symbol, %reason, "excluded"),
                    }
                    excluded.push(Exclusion { symbol, reason });
                }
            }
        }

        sort_ranked(&mut ranked);
        let qualified = ranked.len();
        let summary = BatchSummary::from_ranked(
            &ranked,
            self.config.recommendation.risk_high_volatility,
        );
        if let Some(top) = self.config.top {
            ranked.truncate(top);
        }

        info!(
            evaluated = symbols.len(),
            qualified,
            excluded = excluded.len(),
            buy = summary.as_ref().map_or(0, |s| s.buy_count),
            "ranking complete"
        );

        Ok(RankingReport {
            ranked,
            excluded,
            evaluated: symbols.len(),
            qualified,
            summary,
        })
    }
}

/// Score descending; ties broken by symbol so output is stable.
fn sort_ranked(ranked: &mut [RankedSymbol]) {
    ranked.sort_by(|a, b| {
        b.score()
            .total_cmp(&a.score())
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

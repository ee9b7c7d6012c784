//! Building and validating a `RankConfig` from INI configuration.
//!
//! Sections:
//!
//! - `[ranking]`: strategy, interval, period, workers, top, min_data_points,
//!   portfolio_value, symbols
//! - `[filters]`: preset overrides (market cap, volume, price, RSI band,
//!   volume ratio, volatility band, max_below_sma20)
//! - `[signal]`: BUY/SELL thresholds, confirmations, RSI levels, stop loss
//!   and take profit
//! - `[recommendation]`: entry multiplier, support, timing, range band,
//!   confidence and risk breakpoints, position sizing
//!
//! All checks run before any symbol is fetched.

use crate::domain::error::RankError;
use crate::domain::strategy::{ProfileOverrides, StrategyKind, StrategyProfile};
use crate::domain::universe::{parse_symbols, RankConfig};
use crate::ports::config_port::ConfigPort;

pub const KNOWN_SECTIONS: [&str; 4] = ["ranking", "filters", "signal", "recommendation"];

/// Read every section into a validated `RankConfig`.
///
/// `strategy` replaces `[ranking] strategy` when given; `[filters]` overrides
/// are applied on top of whichever preset wins.
pub fn load_rank_config(
    config: &dyn ConfigPort,
    strategy: Option<StrategyKind>,
) -> Result<RankConfig, RankError> {
    let mut rank = RankConfig::default();

    let kind = match (strategy, config.get_string("ranking", "strategy")) {
        (Some(kind), _) => kind,
        (None, Some(name)) => name.parse()?,
        (None, None) => StrategyKind::Default,
    };
    rank.profile = StrategyProfile::preset(kind).with_overrides(&read_overrides(config)?);

    if let Some(s) = config.get_string("ranking", "interval") {
        rank.interval = s
            .parse()
            .map_err(|e| RankError::config_invalid("ranking", "interval", format!("{}", e)))?;
    }
    if let Some(s) = config.get_string("ranking", "period") {
        rank.period = s
            .parse()
            .map_err(|e| RankError::config_invalid("ranking", "period", format!("{}", e)))?;
    }
    if let Some(workers) = get_count(config, "ranking", "workers")? {
        rank.workers = workers;
    }
    rank.top = get_count(config, "ranking", "top")?;
    rank.min_data_points = get_count(config, "ranking", "min_data_points")?;
    rank.portfolio_value = get_finite(config, "ranking", "portfolio_value")?;
    read_into(config, "filters", "max_below_sma20", &mut rank.max_below_sma20)?;

    let signal = &mut rank.signal;
    read_into(config, "signal", "buy_threshold", &mut signal.buy_threshold)?;
    read_into(config, "signal", "sell_threshold", &mut signal.sell_threshold)?;
    if let Some(n) = get_count(config, "signal", "min_confirmations")? {
        signal.min_confirmations = n;
    }
    read_into(config, "signal", "rsi_oversold", &mut signal.rsi_oversold)?;
    read_into(config, "signal", "rsi_neutral_high", &mut signal.rsi_neutral_high)?;
    read_into(config, "signal", "rsi_overbought", &mut signal.rsi_overbought)?;
    read_into(config, "signal", "volume_confirmation", &mut signal.volume_confirmation)?;
    read_into(config, "signal", "stop_loss", &mut signal.stop_loss)?;
    read_into(config, "signal", "take_profit", &mut signal.take_profit)?;

    let rec = &mut rank.recommendation;
    let section = "recommendation";
    read_into(config, section, "support_tolerance", &mut rec.support_tolerance)?;
    read_into(config, section, "rsi_sensitivity", &mut rec.rsi_sensitivity)?;
    read_into(config, section, "timing_min", &mut rec.timing_min)?;
    read_into(config, section, "timing_max", &mut rec.timing_max)?;
    read_into(config, section, "band_k", &mut rec.band_k)?;
    read_into(config, section, "band_min", &mut rec.band_min)?;
    read_into(config, section, "band_max", &mut rec.band_max)?;
    read_into(config, section, "default_band", &mut rec.default_band)?;
    read_into(config, section, "confidence_medium", &mut rec.confidence_medium)?;
    read_into(config, section, "confidence_high", &mut rec.confidence_high)?;
    read_into(config, section, "volume_bonus", &mut rec.volume_bonus)?;
    read_into(config, section, "agreement_bonus", &mut rec.agreement_bonus)?;
    read_into(config, section, "risk_medium_volatility", &mut rec.risk_medium_volatility)?;
    read_into(config, section, "risk_high_volatility", &mut rec.risk_high_volatility)?;
    read_into(config, section, "small_cap_threshold", &mut rec.small_cap_threshold)?;
    read_into(config, section, "short_horizon_momentum", &mut rec.short_horizon_momentum)?;
    read_into(config, section, "min_position_pct", &mut rec.min_position_pct)?;
    read_into(config, section, "max_position_pct", &mut rec.max_position_pct)?;

    validate_rank_config(&rank)?;
    Ok(rank)
}

/// `[ranking] symbols`, if configured.
pub fn configured_symbols(config: &dyn ConfigPort) -> Result<Option<Vec<String>>, RankError> {
    match config.get_string("ranking", "symbols") {
        Some(list) => parse_symbols(&list)
            .map(Some)
            .map_err(|e| RankError::config_invalid("ranking", "symbols", e.to_string())),
        None => Ok(None),
    }
}

/// Cross-field checks; contradictory thresholds are fatal.
pub fn validate_rank_config(rank: &RankConfig) -> Result<(), RankError> {
    validate_finite(rank)?;
    validate_ranking(rank)?;
    validate_profile(&rank.profile)?;
    validate_signal(rank)?;
    validate_recommendation(rank)?;
    Ok(())
}

/// NaN slips through every ordered comparison below, so reject it first.
fn validate_finite(rank: &RankConfig) -> Result<(), RankError> {
    let p = &rank.profile;
    let s = &rank.signal;
    let r = &rank.recommendation;
    let mut values = vec![
        ("filters", "max_below_sma20", rank.max_below_sma20),
        ("recommendation", "entry_multiplier", p.entry_multiplier),
        ("filters", "min_market_cap", p.min_market_cap),
        ("filters", "min_volume", p.min_volume),
        ("filters", "min_price", p.min_price),
        ("filters", "max_price", p.max_price),
        ("filters", "min_rsi", p.min_rsi),
        ("filters", "max_rsi", p.max_rsi),
        ("filters", "min_volume_ratio", p.min_volume_ratio),
        ("filters", "min_volatility", p.min_volatility),
        ("filters", "max_volatility", p.max_volatility),
        ("signal", "buy_threshold", s.buy_threshold),
        ("signal", "sell_threshold", s.sell_threshold),
        ("signal", "rsi_oversold", s.rsi_oversold),
        ("signal", "rsi_neutral_high", s.rsi_neutral_high),
        ("signal", "rsi_overbought", s.rsi_overbought),
        ("signal", "volume_confirmation", s.volume_confirmation),
        ("signal", "stop_loss", s.stop_loss),
        ("signal", "take_profit", s.take_profit),
        ("recommendation", "support_tolerance", r.support_tolerance),
        ("recommendation", "rsi_sensitivity", r.rsi_sensitivity),
        ("recommendation", "timing_min", r.timing_min),
        ("recommendation", "timing_max", r.timing_max),
        ("recommendation", "band_k", r.band_k),
        ("recommendation", "band_min", r.band_min),
        ("recommendation", "band_max", r.band_max),
        ("recommendation", "default_band", r.default_band),
        ("recommendation", "confidence_medium", r.confidence_medium),
        ("recommendation", "confidence_high", r.confidence_high),
        ("recommendation", "volume_bonus", r.volume_bonus),
        ("recommendation", "agreement_bonus", r.agreement_bonus),
        ("recommendation", "risk_medium_volatility", r.risk_medium_volatility),
        ("recommendation", "risk_high_volatility", r.risk_high_volatility),
        ("recommendation", "small_cap_threshold", r.small_cap_threshold),
        ("recommendation", "short_horizon_momentum", r.short_horizon_momentum),
        ("recommendation", "min_position_pct", r.min_position_pct),
        ("recommendation", "max_position_pct", r.max_position_pct),
    ];
    if let Some(value) = rank.portfolio_value {
        values.push(("ranking", "portfolio_value", value));
    }
    match values.into_iter().find(|(_, _, v)| !v.is_finite()) {
        Some((section, key, value)) => Err(not_finite(section, key, value)),
        None => Ok(()),
    }
}

fn validate_ranking(rank: &RankConfig) -> Result<(), RankError> {
    if rank.workers == 0 {
        return Err(RankError::config_invalid(
            "ranking",
            "workers",
            "workers must be at least 1",
        ));
    }
    if rank.top == Some(0) {
        return Err(RankError::config_invalid("ranking", "top", "top must be at least 1"));
    }
    if rank.min_data_points == Some(0) {
        return Err(RankError::config_invalid(
            "ranking",
            "min_data_points",
            "min_data_points must be at least 1",
        ));
    }
    if let Some(value) = rank.portfolio_value {
        if !(value > 0.0) {
            return Err(RankError::config_invalid(
                "ranking",
                "portfolio_value",
                "portfolio_value must be positive",
            ));
        }
    }
    if !(0.0..1.0).contains(&rank.max_below_sma20) {
        return Err(RankError::config_invalid(
            "filters",
            "max_below_sma20",
            "max_below_sma20 must be in [0, 1)",
        ));
    }
    Ok(())
}

fn validate_profile(p: &StrategyProfile) -> Result<(), RankError> {
    if !(p.entry_multiplier > 0.0) {
        return Err(RankError::config_invalid(
            "recommendation",
            "entry_multiplier",
            "entry_multiplier must be positive",
        ));
    }
    if p.min_market_cap < 0.0 {
        return Err(non_negative("filters", "min_market_cap"));
    }
    if p.min_volume < 0.0 {
        return Err(non_negative("filters", "min_volume"));
    }
    if p.min_volume_ratio < 0.0 {
        return Err(non_negative("filters", "min_volume_ratio"));
    }
    if p.min_price < 0.0 {
        return Err(non_negative("filters", "min_price"));
    }
    if p.min_price >= p.max_price {
        return Err(RankError::config_invalid(
            "filters",
            "min_price",
            format!("min_price {} must be below max_price {}", p.min_price, p.max_price),
        ));
    }
    if !(0.0..=100.0).contains(&p.min_rsi) || !(0.0..=100.0).contains(&p.max_rsi) {
        return Err(RankError::config_invalid(
            "filters",
            "min_rsi",
            "RSI bounds must be within [0, 100]",
        ));
    }
    if p.min_rsi >= p.max_rsi {
        return Err(RankError::config_invalid(
            "filters",
            "min_rsi",
            format!("min_rsi {} must be below max_rsi {}", p.min_rsi, p.max_rsi),
        ));
    }
    if p.min_volatility < 0.0 {
        return Err(non_negative("filters", "min_volatility"));
    }
    if p.min_volatility > p.max_volatility {
        return Err(RankError::config_invalid(
            "filters",
            "min_volatility",
            format!(
                "min_volatility {} exceeds max_volatility {}",
                p.min_volatility, p.max_volatility
            ),
        ));
    }
    Ok(())
}

fn validate_signal(rank: &RankConfig) -> Result<(), RankError> {
    let s = &rank.signal;
    for (key, value) in [
        ("buy_threshold", s.buy_threshold),
        ("sell_threshold", s.sell_threshold),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(RankError::config_invalid(
                "signal",
                key,
                format!("{} must be within [0, 100]", key),
            ));
        }
    }
    if s.sell_threshold >= s.buy_threshold {
        return Err(RankError::config_invalid(
            "signal",
            "sell_threshold",
            format!(
                "sell_threshold {} must be below buy_threshold {}",
                s.sell_threshold, s.buy_threshold
            ),
        ));
    }
    if s.min_confirmations == 0 {
        return Err(RankError::config_invalid(
            "signal",
            "min_confirmations",
            "min_confirmations must be at least 1",
        ));
    }
    if !(s.rsi_oversold < s.rsi_neutral_high && s.rsi_neutral_high <= s.rsi_overbought) {
        return Err(RankError::config_invalid(
            "signal",
            "rsi_neutral_high",
            "expected rsi_oversold < rsi_neutral_high <= rsi_overbought",
        ));
    }
    if s.stop_loss < 0.0 {
        return Err(non_negative("signal", "stop_loss"));
    }
    if s.take_profit < 0.0 {
        return Err(non_negative("signal", "take_profit"));
    }
    Ok(())
}

fn validate_recommendation(rank: &RankConfig) -> Result<(), RankError> {
    let r = &rank.recommendation;
    let section = "recommendation";
    if r.timing_min <= 0.0 || r.timing_min > 1.0 || r.timing_max < 1.0 {
        return Err(RankError::config_invalid(
            section,
            "timing_min",
            "expected 0 < timing_min <= 1 <= timing_max",
        ));
    }
    if r.band_min < 0.0 || r.band_min > r.band_max || r.band_max >= 1.0 {
        return Err(RankError::config_invalid(
            section,
            "band_min",
            "expected 0 <= band_min <= band_max < 1",
        ));
    }
    if !(0.0..1.0).contains(&r.default_band) {
        return Err(RankError::config_invalid(
            section,
            "default_band",
            "default_band must be in [0, 1)",
        ));
    }
    if r.confidence_medium > r.confidence_high {
        return Err(RankError::config_invalid(
            section,
            "confidence_medium",
            format!(
                "confidence_medium {} exceeds confidence_high {}",
                r.confidence_medium, r.confidence_high
            ),
        ));
    }
    if r.risk_medium_volatility > r.risk_high_volatility {
        return Err(RankError::config_invalid(
            section,
            "risk_medium_volatility",
            format!(
                "risk_medium_volatility {} exceeds risk_high_volatility {}",
                r.risk_medium_volatility, r.risk_high_volatility
            ),
        ));
    }
    if r.min_position_pct <= 0.0
        || r.min_position_pct > r.max_position_pct
        || r.max_position_pct > 1.0
    {
        return Err(RankError::config_invalid(
            section,
            "min_position_pct",
            "expected 0 < min_position_pct <= max_position_pct <= 1",
        ));
    }
    Ok(())
}

fn non_negative(section: &str, key: &str) -> RankError {
    RankError::config_invalid(section, key, format!("{} must be non-negative", key))
}

fn not_finite(section: &str, key: &str, value: f64) -> RankError {
    RankError::config_invalid(section, key, format!("{} must be a finite number, got {}", key, value))
}

/// `get_double`, rejecting `nan` and `inf` at read time.
fn get_finite(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, RankError> {
    match config.get_double(section, key)? {
        Some(value) if !value.is_finite() => Err(not_finite(section, key, value)),
        other => Ok(other),
    }
}

fn read_overrides(config: &dyn ConfigPort) -> Result<ProfileOverrides, RankError> {
    let filters = |key| get_finite(config, "filters", key);
    Ok(ProfileOverrides {
        entry_multiplier: get_finite(config, "recommendation", "entry_multiplier")?,
        min_market_cap: filters("min_market_cap")?,
        min_volume: filters("min_volume")?,
        min_price: filters("min_price")?,
        max_price: filters("max_price")?,
        min_rsi: filters("min_rsi")?,
        max_rsi: filters("max_rsi")?,
        min_volume_ratio: filters("min_volume_ratio")?,
        min_volatility: filters("min_volatility")?,
        max_volatility: filters("max_volatility")?,
    })
}

fn read_into(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    slot: &mut f64,
) -> Result<(), RankError> {
    if let Some(value) = get_finite(config, section, key)? {
        *slot = value;
    }
    Ok(())
}

fn get_count(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<usize>, RankError> {
    match config.get_int(section, key)? {
        Some(n) if n < 0 => Err(RankError::config_invalid(
            section,
            key,
            format!("{} must not be negative", key),
        )),
        Some(n) => Ok(Some(n as usize)),
        None => Ok(None),
    }
}

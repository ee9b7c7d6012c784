//! Strategy presets.
//!
//! A `StrategyProfile` is chosen once before a ranking pass and shared
//! read-only by every symbol evaluated in that pass.

use crate::domain::error::RankError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Default,
    Conservative,
    Aggressive,
    Momentum,
    Value,
    Dividend,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Default,
        StrategyKind::Conservative,
        StrategyKind::Aggressive,
        StrategyKind::Momentum,
        StrategyKind::Value,
        StrategyKind::Dividend,
    ];

    pub fn description(self) -> &'static str {
        match self {
            StrategyKind::Default => "Balanced large-cap screen",
            StrategyKind::Conservative => "Larger, more liquid companies with low volatility",
            StrategyKind::Aggressive => "Smaller companies, wider RSI band, higher volatility",
            StrategyKind::Momentum => "Above-average volume, not oversold",
            StrategyKind::Value => "Established companies in a lower price range",
            StrategyKind::Dividend => "Large, stable companies with low volatility",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Default => "Default",
            StrategyKind::Conservative => "Conservative",
            StrategyKind::Aggressive => "Aggressive",
            StrategyKind::Momentum => "Momentum",
            StrategyKind::Value => "Value",
            StrategyKind::Dividend => "Dividend Focus",
        };
        f.write_str(name)
    }
}

impl FromStr for StrategyKind {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect();
        match normalized.as_str() {
            "default" => Ok(StrategyKind::Default),
            "conservative" => Ok(StrategyKind::Conservative),
            "aggressive" => Ok(StrategyKind::Aggressive),
            "momentum" => Ok(StrategyKind::Momentum),
            "value" => Ok(StrategyKind::Value),
            "dividend" | "dividendfocus" => Ok(StrategyKind::Dividend),
            _ => Err(RankError::UnknownStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyProfile {
    pub kind: StrategyKind,
    /// Applied to the support level to get the suggested entry.
    pub entry_multiplier: f64,
    pub min_market_cap: f64,
    pub min_volume: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub min_rsi: f64,
    pub max_rsi: f64,
    pub min_volume_ratio: f64,
    /// Daily return volatility bounds, as fractions.
    pub min_volatility: f64,
    pub max_volatility: f64,
}

impl StrategyProfile {
    pub fn preset(kind: StrategyKind) -> Self {
        let base = StrategyProfile {
            kind,
            entry_multiplier: 1.0,
            min_market_cap: 10_000_000_000.0,
            min_volume: 1_000_000.0,
            min_price: 5.0,
            max_price: 1000.0,
            min_rsi: 25.0,
            max_rsi: 75.0,
            min_volume_ratio: 0.5,
            min_volatility: 0.0,
            max_volatility: 0.05,
        };
        match kind {
            StrategyKind::Default => base,
            StrategyKind::Conservative => StrategyProfile {
                entry_multiplier: 0.98,
                min_market_cap: 50_000_000_000.0,
                min_volume: 2_000_000.0,
                min_price: 10.0,
                max_price: 500.0,
                min_rsi: 30.0,
                max_rsi: 70.0,
                min_volume_ratio: 0.8,
                max_volatility: 0.03,
                ..base
            },
            StrategyKind::Aggressive => StrategyProfile {
                entry_multiplier: 1.02,
                min_market_cap: 5_000_000_000.0,
                min_volume: 500_000.0,
                min_rsi: 20.0,
                max_rsi: 80.0,
                min_volume_ratio: 0.3,
                max_volatility: 0.08,
                ..base
            },
            StrategyKind::Momentum => StrategyProfile {
                entry_multiplier: 1.01,
                min_volume: 1_500_000.0,
                min_rsi: 40.0,
                max_rsi: 70.0,
                min_volume_ratio: 1.0,
                max_volatility: 0.06,
                ..base
            },
            StrategyKind::Value => StrategyProfile {
                entry_multiplier: 0.985,
                min_market_cap: 20_000_000_000.0,
                max_price: 200.0,
                max_rsi: 65.0,
                max_volatility: 0.04,
                ..base
            },
            StrategyKind::Dividend => StrategyProfile {
                entry_multiplier: 0.99,
                min_market_cap: 30_000_000_000.0,
                min_price: 10.0,
                max_price: 300.0,
                min_rsi: 30.0,
                max_rsi: 70.0,
                min_volume_ratio: 0.6,
                max_volatility: 0.035,
                ..base
            },
        }
    }

    pub fn with_overrides(mut self, o: &ProfileOverrides) -> Self {
        let apply = |slot: &mut f64, value: Option<f64>| {
            if let Some(v) = value {
                *slot = v;
            }
        };
        apply(&mut self.entry_multiplier, o.entry_multiplier);
        apply(&mut self.min_market_cap, o.min_market_cap);
        apply(&mut self.min_volume, o.min_volume);
        apply(&mut self.min_price, o.min_price);
        apply(&mut self.max_price, o.max_price);
        apply(&mut self.min_rsi, o.min_rsi);
        apply(&mut self.max_rsi, o.max_rsi);
        apply(&mut self.min_volume_ratio, o.min_volume_ratio);
        apply(&mut self.min_volatility, o.min_volatility);
        apply(&mut self.max_volatility, o.max_volatility);
        self
    }
}

impl Default for StrategyProfile {
    fn default() -> Self {
        Self::preset(StrategyKind::Default)
    }
}

/// Per-field replacements for a preset, read from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileOverrides {
    pub entry_multiplier: Option<f64>,
    pub min_market_cap: Option<f64>,
    pub min_volume: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rsi: Option<f64>,
    pub max_rsi: Option<f64>,
    pub min_volume_ratio: Option<f64>,
    pub min_volatility: Option<f64>,
    pub max_volatility: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        assert_eq!("conservative".parse::<StrategyKind>().unwrap(), StrategyKind::Conservative);
        assert_eq!("Dividend Focus".parse::<StrategyKind>().unwrap(), StrategyKind::Dividend);
        assert_eq!("dividend_focus".parse::<StrategyKind>().unwrap(), StrategyKind::Dividend);
        assert_eq!(" MOMENTUM ".parse::<StrategyKind>().unwrap(), StrategyKind::Momentum);
    }

    #[test]
    fn unknown_strategy_is_error() {
        let err = "yolo".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, RankError::UnknownStrategy(ref s) if s == "yolo"));
    }

    #[test]
    fn display_round_trips() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.to_string().parse::<StrategyKind>().unwrap(), kind);
        }
    }

    #[test]
    fn multipliers_ordered() {
        let m = |k| StrategyProfile::preset(k).entry_multiplier;
        assert!(m(StrategyKind::Conservative) < m(StrategyKind::Default));
        assert!(m(StrategyKind::Default) < m(StrategyKind::Aggressive));
        assert!(m(StrategyKind::Value) < m(StrategyKind::Dividend));
    }

    #[test]
    fn conservative_preset_values() {
        let p = StrategyProfile::preset(StrategyKind::Conservative);
        assert_eq!(p.min_market_cap, 50_000_000_000.0);
        assert_eq!(p.min_volume, 2_000_000.0);
        assert_eq!((p.min_price, p.max_price), (10.0, 500.0));
        assert_eq!((p.min_rsi, p.max_rsi), (30.0, 70.0));
        assert_eq!(p.max_volatility, 0.03);
    }

    #[test]
    fn presets_are_internally_consistent() {
        for kind in StrategyKind::ALL {
            let p = StrategyProfile::preset(kind);
            assert!(p.min_price < p.max_price, "{kind}");
            assert!(p.min_rsi < p.max_rsi, "{kind}");
            assert!(p.min_volatility < p.max_volatility, "{kind}");
            assert!(p.entry_multiplier > 0.0, "{kind}");
        }
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let overrides = ProfileOverrides {
            min_rsi: Some(35.0),
            max_volatility: Some(0.02),
            ..Default::default()
        };
        let p = StrategyProfile::preset(StrategyKind::Aggressive).with_overrides(&overrides);
        assert_eq!(p.min_rsi, 35.0);
        assert_eq!(p.max_volatility, 0.02);
        assert_eq!(p.max_rsi, 80.0);
        assert_eq!(p.kind, StrategyKind::Aggressive);
    }
}

//! BUY / SELL / HOLD derivation.
//!
//! Decisions and reasons come from the same rules: a reason string is the
//! rendering of a rule that evaluated true, so every listed reason took part
//! in the decision.

use crate::domain::rule::{Operand, Rule};
use crate::domain::rule_eval::{describe, evaluate, EvalContext};
use crate::domain::scoring::ScoreBreakdown;
use crate::domain::snapshot::{IndicatorSnapshot, SnapshotField};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub reasons: Vec<String>,
    /// BUY-side conditions that held, whatever the final decision.
    pub confirmations: usize,
}

/// An open holding; only needed to derive SELL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub entry_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub min_confirmations: usize,
    pub rsi_oversold: f64,
    pub rsi_neutral_high: f64,
    pub rsi_overbought: f64,
    pub volume_confirmation: f64,
    /// Fractional loss that forces a SELL.
    pub stop_loss: f64,
    /// Fractional gain that forces a SELL.
    pub take_profit: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            buy_threshold: 70.0,
            sell_threshold: 40.0,
            min_confirmations: 2,
            rsi_oversold: 30.0,
            rsi_neutral_high: 55.0,
            rsi_overbought: 70.0,
            volume_confirmation: 1.0,
            stop_loss: 0.05,
            take_profit: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NamedRule {
    label: &'static str,
    rule: Rule,
}

impl NamedRule {
    fn new(label: &'static str, rule: Rule) -> Self {
        Self { label, rule }
    }

    fn reason(&self, ctx: &EvalContext<'_>) -> String {
        format!("{}: {}", self.label, describe(&self.rule, ctx))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalGenerator {
    min_confirmations: usize,
    buy_gate: NamedRule,
    confirmations: Vec<NamedRule>,
    sell_triggers: Vec<NamedRule>,
}

impl SignalGenerator {
    pub fn new(config: &SignalConfig) -> Self {
        let field = Operand::field;
        let constant = Operand::Constant;

        let buy_gate = NamedRule::new(
            "Score above buy threshold",
            Rule::above(Operand::Score, constant(config.buy_threshold)),
        );
        let confirmations = vec![
            NamedRule::new(
                "RSI neutral-to-oversold",
                Rule::between(
                    field(SnapshotField::Rsi),
                    config.rsi_oversold,
                    config.rsi_neutral_high,
                ),
            ),
            NamedRule::new(
                "Price above SMA20 and SMA50",
                Rule::And(vec![
                    Rule::above(Operand::Price, field(SnapshotField::Sma20)),
                    Rule::above(Operand::Price, field(SnapshotField::Sma50)),
                ]),
            ),
            NamedRule::new(
                "MACD bullish crossover",
                Rule::CrossAbove {
                    left: field(SnapshotField::MacdLine),
                    right: field(SnapshotField::MacdSignal),
                },
            ),
            NamedRule::new(
                "Above-average volume",
                Rule::above(
                    field(SnapshotField::VolumeRatio),
                    constant(config.volume_confirmation),
                ),
            ),
        ];
        let sell_triggers = vec![
            NamedRule::new(
                "Score below sell threshold",
                Rule::below(Operand::Score, constant(config.sell_threshold)),
            ),
            NamedRule::new(
                "Overbought with bearish MACD",
                Rule::And(vec![
                    Rule::above(field(SnapshotField::Rsi), constant(config.rsi_overbought)),
                    Rule::below(field(SnapshotField::MacdHistogram), constant(0.0)),
                ]),
            ),
            NamedRule::new(
                "Stop loss",
                Rule::at_most(Operand::PositionReturn, constant(-config.stop_loss)),
            ),
            NamedRule::new(
                "Take profit",
                Rule::at_least(Operand::PositionReturn, constant(config.take_profit)),
            ),
            NamedRule::new(
                "Price below SMA20 (downtrend)",
                Rule::below(Operand::Price, field(SnapshotField::Sma20)),
            ),
        ];

        Self {
            min_confirmations: config.min_confirmations,
            buy_gate,
            confirmations,
            sell_triggers,
        }
    }

    pub fn generate(
        &self,
        snapshot: &IndicatorSnapshot,
        breakdown: &ScoreBreakdown,
        position: Option<&Position>,
    ) -> Signal {
        let mut ctx = EvalContext::new(snapshot).with_score(breakdown.composite());
        if let Some(p) = position {
            ctx = ctx.with_entry_price(p.entry_price);
        }

        let confirmed: Vec<String> = self
            .confirmations
            .iter()
            .filter(|c| evaluate(&c.rule, &ctx) == Some(true))
            .map(|c| c.reason(&ctx))
            .collect();
        let confirmations = confirmed.len();

        if position.is_some() {
            let triggered: Vec<String> = self
                .sell_triggers
                .iter()
                .filter(|t| evaluate(&t.rule, &ctx) == Some(true))
                .map(|t| t.reason(&ctx))
                .collect();
            if !triggered.is_empty() {
                return Signal {
                    kind: SignalKind::Sell,
                    reasons: triggered,
                    confirmations,
                };
            }
        }

        let gate_open = evaluate(&self.buy_gate.rule, &ctx) == Some(true);
        if gate_open && confirmations >= self.min_confirmations {
            let mut reasons = Vec::with_capacity(confirmations + 1);
            reasons.push(self.buy_gate.reason(&ctx));
            reasons.extend(confirmed);
            return Signal {
                kind: SignalKind::Buy,
                reasons,
                confirmations,
            };
        }

        let mut reasons = Vec::new();
        if !gate_open {
            reasons.push(format!(
                "{} not met: {}",
                self.buy_gate.label,
                describe(&self.buy_gate.rule, &ctx)
            ));
        }
        reasons.push(format!(
            "{} of {} required confirmations",
            confirmations, self.min_confirmations
        ));
        reasons.extend(confirmed);
        Signal {
            kind: SignalKind::Hold,
            reasons,
            confirmations,
        }
    }
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new(&SignalConfig::default())
    }
}

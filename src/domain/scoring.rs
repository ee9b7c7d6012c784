//! Composite scoring.
//!
//! Eight factors, each a threshold table of tier points plus optional bonus
//! rows, capped to `[0, max]`. The factor maxima total 115, so every raw
//! score is scaled by `100 / total_max`; the composite is the sum of the
//! scaled factor scores and lands in `[0, 100]`.

use crate::domain::rule::{Operand, Rule};
use crate::domain::rule_eval::{describe, evaluate, EvalContext, ThresholdTable};
use crate::domain::snapshot::{IndicatorSnapshot, IndicatorUndefined, SnapshotField};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreFactor {
    Momentum,
    Rsi,
    MovingAverageTrend,
    Macd,
    Volume,
    Volatility,
    Consistency,
    Bollinger,
}

impl ScoreFactor {
    pub const ALL: [ScoreFactor; 8] = [
        ScoreFactor::Momentum,
        ScoreFactor::Rsi,
        ScoreFactor::MovingAverageTrend,
        ScoreFactor::Macd,
        ScoreFactor::Volume,
        ScoreFactor::Volatility,
        ScoreFactor::Consistency,
        ScoreFactor::Bollinger,
    ];

    pub fn max_points(self) -> f64 {
        match self {
            ScoreFactor::Momentum => 25.0,
            ScoreFactor::Rsi => 20.0,
            ScoreFactor::MovingAverageTrend => 20.0,
            ScoreFactor::Macd => 15.0,
            ScoreFactor::Volume => 12.0,
            ScoreFactor::Volatility => 8.0,
            ScoreFactor::Consistency => 8.0,
            ScoreFactor::Bollinger => 7.0,
        }
    }
}

impl fmt::Display for ScoreFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreFactor::Momentum => "Momentum",
            ScoreFactor::Rsi => "RSI positioning",
            ScoreFactor::MovingAverageTrend => "Moving-average trend",
            ScoreFactor::Macd => "MACD signal",
            ScoreFactor::Volume => "Volume confirmation",
            ScoreFactor::Volatility => "Volatility assessment",
            ScoreFactor::Consistency => "Momentum consistency",
            ScoreFactor::Bollinger => "Bollinger position",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorStatus {
    /// Every input indicator was defined.
    Complete,
    /// Some inputs were undefined; scored on the rest.
    Partial,
    /// No input was defined; contributes zero.
    Undefined,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorScore {
    pub factor: ScoreFactor,
    pub raw: f64,
    pub max: f64,
    /// Contribution to the composite.
    pub weighted: f64,
    pub status: FactorStatus,
    /// Rendered tier rule that decided the points, if any.
    pub detail: Option<String>,
}

/// Composite score plus its eight parts. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    composite: f64,
    factors: Vec<FactorScore>,
    warnings: Vec<IndicatorUndefined>,
}

impl ScoreBreakdown {
    pub fn composite(&self) -> f64 {
        self.composite
    }

    pub fn factors(&self) -> &[FactorScore] {
        &self.factors
    }

    pub fn factor(&self, factor: ScoreFactor) -> Option<&FactorScore> {
        self.factors.iter().find(|f| f.factor == factor)
    }

    pub fn warnings(&self) -> &[IndicatorUndefined] {
        &self.warnings
    }

    /// True when any factor was scored on partial or no data.
    pub fn is_partial(&self) -> bool {
        self.factors
            .iter()
            .any(|f| f.status != FactorStatus::Complete)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorModel {
    pub factor: ScoreFactor,
    pub tiers: ThresholdTable<f64>,
    pub bonuses: Vec<(Rule, f64)>,
}

impl FactorModel {
    fn inputs(&self) -> Vec<SnapshotField> {
        let mut fields = self.tiers.fields();
        for (rule, _) in &self.bonuses {
            for field in rule.fields() {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        fields
    }

    fn score(&self, ctx: &EvalContext<'_>) -> (f64, FactorStatus, Option<String>) {
        let inputs = self.inputs();
        let defined = inputs
            .iter()
            .filter(|f| ctx.snapshot.get(**f).is_some())
            .count();
        let status = if defined == inputs.len() {
            FactorStatus::Complete
        } else if defined == 0 {
            FactorStatus::Undefined
        } else {
            FactorStatus::Partial
        };
        if status == FactorStatus::Undefined {
            return (0.0, status, None);
        }

        let tier = self.tiers.evaluate(ctx);
        let mut raw = *tier.outcome;
        let mut detail = tier.row.map(|i| describe(&self.tiers.rows()[i].0, ctx));
        for (rule, points) in &self.bonuses {
            if evaluate(rule, ctx) == Some(true) {
                raw += points;
                let text = describe(rule, ctx);
                detail = Some(match detail {
                    Some(d) => format!("{d}; bonus {text}"),
                    None => format!("bonus {text}"),
                });
            }
        }
        (raw.clamp(0.0, self.factor.max_points()), status, detail)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringModel {
    factors: Vec<FactorModel>,
}

impl ScoringModel {
    pub fn new(factors: Vec<FactorModel>) -> Self {
        Self { factors }
    }

    pub fn factors(&self) -> &[FactorModel] {
        &self.factors
    }

    fn total_max(&self) -> f64 {
        self.factors.iter().map(|f| f.factor.max_points()).sum()
    }

    pub fn score(&self, snapshot: &IndicatorSnapshot) -> ScoreBreakdown {
        let ctx = EvalContext::new(snapshot);
        let total_max = self.total_max();
        let scale = if total_max > 0.0 { 100.0 / total_max } else { 0.0 };

        let mut composite = 0.0;
        let factors = self
            .factors
            .iter()
            .map(|model| {
                let (raw, status, detail) = model.score(&ctx);
                let weighted = raw * scale;
                composite += weighted;
                FactorScore {
                    factor: model.factor,
                    raw,
                    max: model.factor.max_points(),
                    weighted,
                    status,
                    detail,
                }
            })
            .collect();

        ScoreBreakdown {
            composite,
            factors,
            warnings: snapshot.undefined(),
        }
    }
}

impl Default for ScoringModel {
    fn default() -> Self {
        Self::new(vec![
            momentum_model(),
            rsi_model(),
            trend_model(),
            macd_model(),
            volume_model(),
            volatility_model(),
            consistency_model(),
            bollinger_model(),
        ])
    }
}

fn field(f: SnapshotField) -> Operand {
    Operand::field(f)
}

fn constant(v: f64) -> Operand {
    Operand::Constant(v)
}

/// `lower <= x <= upper` or the mirrored band on the other side.
fn either(operand: SnapshotField, a: (f64, f64), b: (f64, f64)) -> Rule {
    Rule::Or(vec![
        Rule::between(field(operand), a.0, a.1),
        Rule::between(field(operand), b.0, b.1),
    ])
}

fn either_band(a: (f64, f64), b: (f64, f64)) -> Rule {
    Rule::Or(vec![
        Rule::between(Operand::BandPosition, a.0, a.1),
        Rule::between(Operand::BandPosition, b.0, b.1),
    ])
}

fn momentum_model() -> FactorModel {
    use SnapshotField::Momentum as M;
    FactorModel {
        factor: ScoreFactor::Momentum,
        tiers: ThresholdTable::new(
            vec![
                (Rule::between(field(M), 3.0, 12.0), 25.0),
                (either(M, (1.5, 3.0), (12.0, 20.0)), 18.0),
                (either(M, (0.5, 1.5), (20.0, 30.0)), 12.0),
                (Rule::above(field(M), constant(0.0)), 6.0),
            ],
            0.0,
        ),
        bonuses: Vec::new(),
    }
}

fn rsi_model() -> FactorModel {
    use SnapshotField::Rsi as R;
    FactorModel {
        factor: ScoreFactor::Rsi,
        tiers: ThresholdTable::new(
            vec![
                (Rule::between(field(R), 45.0, 65.0), 20.0),
                (either(R, (35.0, 45.0), (65.0, 70.0)), 15.0),
                (either(R, (30.0, 35.0), (70.0, 75.0)), 10.0),
                (either(R, (25.0, 30.0), (75.0, 80.0)), 5.0),
            ],
            0.0,
        ),
        bonuses: Vec::new(),
    }
}

fn trend_model() -> FactorModel {
    let stacked = || {
        vec![
            Rule::above(Operand::Price, field(SnapshotField::Sma20)),
            Rule::above(field(SnapshotField::Sma20), field(SnapshotField::Sma50)),
        ]
    };
    let strength = |price_gap: f64, ma_gap: f64| {
        let mut rules = stacked();
        rules.push(Rule::at_least(
            Operand::relative(Operand::Price, field(SnapshotField::Sma20)),
            constant(price_gap),
        ));
        rules.push(Rule::at_least(
            Operand::relative(field(SnapshotField::Sma20), field(SnapshotField::Sma50)),
            constant(ma_gap),
        ));
        Rule::And(rules)
    };

    FactorModel {
        factor: ScoreFactor::MovingAverageTrend,
        tiers: ThresholdTable::new(
            vec![
                (strength(0.05, 0.02), 20.0),
                (strength(0.02, 0.01), 15.0),
                (Rule::And(stacked()), 10.0),
                (Rule::above(Operand::Price, field(SnapshotField::Sma20)), 8.0),
                (Rule::above(Operand::Price, field(SnapshotField::Sma50)), 4.0),
            ],
            0.0,
        ),
        bonuses: vec![(
            Rule::above(field(SnapshotField::Sma50), field(SnapshotField::Sma200)),
            3.0,
        )],
    }
}

fn macd_model() -> FactorModel {
    let line = || field(SnapshotField::MacdLine);
    let signal = || field(SnapshotField::MacdSignal);
    let bullish = || Rule::above(line(), signal());
    let positive = || Rule::above(line(), constant(0.0));

    FactorModel {
        factor: ScoreFactor::Macd,
        tiers: ThresholdTable::new(
            vec![
                (
                    Rule::And(vec![
                        bullish(),
                        positive(),
                        Rule::above(Operand::relative(line(), signal()), constant(0.2)),
                    ]),
                    15.0,
                ),
                (Rule::And(vec![bullish(), positive()]), 12.0),
                (bullish(), 8.0),
                (positive(), 5.0),
            ],
            0.0,
        ),
        bonuses: vec![(
            Rule::above(field(SnapshotField::MacdHistogram), constant(0.0)),
            2.0,
        )],
    }
}

fn volume_model() -> FactorModel {
    let ratio = || field(SnapshotField::VolumeRatio);
    FactorModel {
        factor: ScoreFactor::Volume,
        tiers: ThresholdTable::new(
            vec![
                (Rule::at_least(ratio(), constant(1.5)), 12.0),
                (Rule::at_least(ratio(), constant(1.2)), 10.0),
                (Rule::at_least(ratio(), constant(1.0)), 8.0),
                (Rule::at_least(ratio(), constant(0.8)), 5.0),
            ],
            0.0,
        ),
        bonuses: Vec::new(),
    }
}

fn volatility_model() -> FactorModel {
    use SnapshotField::Volatility as V;
    FactorModel {
        factor: ScoreFactor::Volatility,
        tiers: ThresholdTable::new(
            vec![
                (Rule::between(field(V), 0.015, 0.025), 8.0),
                (either(V, (0.01, 0.015), (0.025, 0.035)), 6.0),
                (either(V, (0.005, 0.01), (0.035, 0.045)), 4.0),
            ],
            0.0,
        ),
        bonuses: Vec::new(),
    }
}

fn consistency_model() -> FactorModel {
    let short = || field(SnapshotField::ShortMomentum);
    let medium = || field(SnapshotField::MediumMomentum);
    let both_up = || {
        vec![
            Rule::above(short(), constant(0.0)),
            Rule::above(medium(), constant(0.0)),
        ]
    };
    let mut consistent = both_up();
    consistent.push(Rule::below(Operand::spread(short(), medium()), constant(2.0)));

    FactorModel {
        factor: ScoreFactor::Consistency,
        tiers: ThresholdTable::new(
            vec![
                (Rule::And(consistent), 8.0),
                (Rule::And(both_up()), 5.0),
            ],
            0.0,
        ),
        bonuses: Vec::new(),
    }
}

fn bollinger_model() -> FactorModel {
    FactorModel {
        factor: ScoreFactor::Bollinger,
        tiers: ThresholdTable::new(
            vec![
                (Rule::between(Operand::BandPosition, 0.3, 0.7), 7.0),
                (either_band((0.2, 0.3), (0.7, 0.8)), 5.0),
                (either_band((0.1, 0.2), (0.8, 0.9)), 3.0),
            ],
            0.0,
        ),
        bonuses: Vec::new(),
    }
}

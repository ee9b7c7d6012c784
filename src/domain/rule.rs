//! Rule AST data structures.
//!
//! Scoring tiers, signal conditions, confidence and risk breakpoints are all
//! written as `Rule` values over snapshot operands:
//! - `Operand`: What can be compared (price, score, snapshot fields, constants)
//! - `Rule`: Comparison, range, crossover and composite predicates

use crate::domain::snapshot::SnapshotField;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Latest close.
    Price,
    /// Composite score of the breakdown under evaluation.
    Score,
    /// Fractional return of the held position at the latest close.
    PositionReturn,
    Constant(f64),
    Field(SnapshotField),
    /// `(value - base) / |base|`; undefined when `base` is zero.
    Relative {
        value: Box<Operand>,
        base: Box<Operand>,
    },
    /// `|left - right|`.
    Spread(Box<Operand>, Box<Operand>),
    /// Position of the price inside the Bollinger bands, 0 at lower, 1 at upper.
    BandPosition,
}

impl Operand {
    pub fn field(field: SnapshotField) -> Self {
        Operand::Field(field)
    }

    pub fn relative(value: Operand, base: Operand) -> Self {
        Operand::Relative {
            value: Box::new(value),
            base: Box::new(base),
        }
    }

    pub fn spread(left: Operand, right: Operand) -> Self {
        Operand::Spread(Box::new(left), Box::new(right))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Always true; the catch-all row of a table.
    Always,
    /// Left crosses above right between the previous and the latest bar.
    CrossAbove {
        left: Operand,
        right: Operand,
    },
    Above {
        left: Operand,
        right: Operand,
    },
    Below {
        left: Operand,
        right: Operand,
    },
    AtLeast {
        left: Operand,
        right: Operand,
    },
    AtMost {
        left: Operand,
        right: Operand,
    },
    /// `lower <= operand <= upper`.
    Between {
        operand: Operand,
        lower: f64,
        upper: f64,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
}

impl Rule {
    pub fn above(left: Operand, right: Operand) -> Self {
        Rule::Above { left, right }
    }

    pub fn below(left: Operand, right: Operand) -> Self {
        Rule::Below { left, right }
    }

    pub fn at_least(left: Operand, right: Operand) -> Self {
        Rule::AtLeast { left, right }
    }

    pub fn at_most(left: Operand, right: Operand) -> Self {
        Rule::AtMost { left, right }
    }

    pub fn between(operand: Operand, lower: f64, upper: f64) -> Self {
        Rule::Between {
            operand,
            lower,
            upper,
        }
    }

    /// Snapshot fields the rule reads, in first-seen order.
    pub fn fields(&self) -> Vec<SnapshotField> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut Vec<SnapshotField>) {
        match self {
            Rule::Always => {}
            Rule::CrossAbove { left, right }
            | Rule::Above { left, right }
            | Rule::Below { left, right }
            | Rule::AtLeast { left, right }
            | Rule::AtMost { left, right } => {
                operand_fields(left, out);
                operand_fields(right, out);
            }
            Rule::Between { operand, .. } => operand_fields(operand, out),
            Rule::And(rules) | Rule::Or(rules) => {
                for r in rules {
                    r.collect_fields(out);
                }
            }
            Rule::Not(rule) => rule.collect_fields(out),
        }
    }
}

fn operand_fields(operand: &Operand, out: &mut Vec<SnapshotField>) {
    match operand {
        Operand::Field(f) => push_unique(out, *f),
        Operand::BandPosition => {
            push_unique(out, SnapshotField::BollingerUpper);
            push_unique(out, SnapshotField::BollingerLower);
        }
        Operand::Relative { value, base } => {
            operand_fields(value, out);
            operand_fields(base, out);
        }
        Operand::Spread(left, right) => {
            operand_fields(left, out);
            operand_fields(right, out);
        }
        Operand::Price | Operand::Score | Operand::PositionReturn | Operand::Constant(_) => {}
    }
}

fn push_unique(out: &mut Vec<SnapshotField>, field: SnapshotField) {
    if !out.contains(&field) {
        out.push(field);
    }
}

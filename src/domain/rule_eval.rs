//! Rule evaluation engine.
//!
//! Evaluates rules against an `IndicatorSnapshot` and renders the same rules
//! as human-readable reasons, so a decision and its justification can never
//! disagree.
//!
//! # Evaluation Semantics
//!
//! Evaluation is three-valued: `Some(true)`, `Some(false)`, or `None` when an
//! operand is undefined.
//!
//! - `CROSS_ABOVE`: needs the previous value of both sides; only the MACD pair
//!   keeps one
//! - `AND`: `Some(false)` if any child is false, else `None` if any is undefined
//! - `OR`: `Some(true)` if any child is true, else `None` if any is undefined
//! - `NOT`: undefined stays undefined
//!
//! A `ThresholdTable` picks the first row that evaluates to `Some(true)`;
//! undefined rows are skipped, not treated as matches.

use crate::domain::rule::{Operand, Rule};
use crate::domain::snapshot::{IndicatorSnapshot, SnapshotField};

#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub snapshot: &'a IndicatorSnapshot,
    pub score: Option<f64>,
    pub entry_price: Option<f64>,
}

impl<'a> EvalContext<'a> {
    pub fn new(snapshot: &'a IndicatorSnapshot) -> Self {
        Self {
            snapshot,
            score: None,
            entry_price: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_entry_price(mut self, entry_price: f64) -> Self {
        self.entry_price = Some(entry_price);
        self
    }
}

pub fn evaluate(rule: &Rule, ctx: &EvalContext<'_>) -> Option<bool> {
    match rule {
        Rule::Always => Some(true),
        Rule::CrossAbove { left, right } => {
            let left_curr = resolve(left, ctx)?;
            let right_curr = resolve(right, ctx)?;
            let left_prev = resolve_previous(left, ctx)?;
            let right_prev = resolve_previous(right, ctx)?;
            Some(left_curr > right_curr && left_prev <= right_prev)
        }
        Rule::Above { left, right } => Some(resolve(left, ctx)? > resolve(right, ctx)?),
        Rule::Below { left, right } => Some(resolve(left, ctx)? < resolve(right, ctx)?),
        Rule::AtLeast { left, right } => Some(resolve(left, ctx)? >= resolve(right, ctx)?),
        Rule::AtMost { left, right } => Some(resolve(left, ctx)? <= resolve(right, ctx)?),
        Rule::Between {
            operand,
            lower,
            upper,
        } => {
            let val = resolve(operand, ctx)?;
            Some(val >= *lower && val <= *upper)
        }
        Rule::And(rules) => {
            let mut undefined = false;
            for r in rules {
                match evaluate(r, ctx) {
                    Some(false) => return Some(false),
                    None => undefined = true,
                    Some(true) => {}
                }
            }
            (!undefined).then_some(true)
        }
        Rule::Or(rules) => {
            let mut undefined = false;
            for r in rules {
                match evaluate(r, ctx) {
                    Some(true) => return Some(true),
                    None => undefined = true,
                    Some(false) => {}
                }
            }
            (!undefined).then_some(false)
        }
        Rule::Not(rule) => evaluate(rule, ctx).map(|v| !v),
    }
}

pub fn resolve(operand: &Operand, ctx: &EvalContext<'_>) -> Option<f64> {
    let snap = ctx.snapshot;
    match operand {
        Operand::Price => Some(snap.close),
        Operand::Score => ctx.score,
        Operand::PositionReturn => {
            let entry = ctx.entry_price.filter(|p| *p > 0.0)?;
            Some((snap.close - entry) / entry)
        }
        Operand::Constant(v) => Some(*v),
        Operand::Field(field) => snap.get(*field),
        Operand::Relative { value, base } => {
            let value = resolve(value, ctx)?;
            let base = resolve(base, ctx)?;
            (base != 0.0).then(|| (value - base) / base.abs())
        }
        Operand::Spread(left, right) => Some((resolve(left, ctx)? - resolve(right, ctx)?).abs()),
        Operand::BandPosition => {
            let upper = snap.get(SnapshotField::BollingerUpper)?;
            let lower = snap.get(SnapshotField::BollingerLower)?;
            let width = upper - lower;
            (width > 0.0).then(|| (snap.close - lower) / width)
        }
    }
}

fn resolve_previous(operand: &Operand, ctx: &EvalContext<'_>) -> Option<f64> {
    match operand {
        Operand::Constant(v) => Some(*v),
        Operand::Field(field) => ctx.snapshot.previous(*field),
        _ => None,
    }
}

/// Render `rule` with the values it was decided on.
pub fn describe(rule: &Rule, ctx: &EvalContext<'_>) -> String {
    match rule {
        Rule::Always => "always".to_string(),
        Rule::CrossAbove { left, right } => format!(
            "{} crossed above {} ({} vs {}, was {} vs {})",
            label(left),
            label(right),
            fmt_value(resolve(left, ctx)),
            fmt_value(resolve(right, ctx)),
            fmt_value(resolve_previous(left, ctx)),
            fmt_value(resolve_previous(right, ctx)),
        ),
        Rule::Above { left, right } => {
            format!("{} > {}", operand_text(left, ctx), operand_text(right, ctx))
        }
        Rule::Below { left, right } => {
            format!("{} < {}", operand_text(left, ctx), operand_text(right, ctx))
        }
        Rule::AtLeast { left, right } => {
            format!("{} >= {}", operand_text(left, ctx), operand_text(right, ctx))
        }
        Rule::AtMost { left, right } => {
            format!("{} <= {}", operand_text(left, ctx), operand_text(right, ctx))
        }
        Rule::Between {
            operand,
            lower,
            upper,
        } => format!("{} in [{}, {}]", operand_text(operand, ctx), lower, upper),
        Rule::And(rules) => join(rules, " and ", ctx),
        Rule::Or(rules) => join(rules, " or ", ctx),
        Rule::Not(rule) => format!("not ({})", describe(rule, ctx)),
    }
}

fn join(rules: &[Rule], sep: &str, ctx: &EvalContext<'_>) -> String {
    rules
        .iter()
        .map(|r| describe(r, ctx))
        .collect::<Vec<_>>()
        .join(sep)
}

fn operand_text(operand: &Operand, ctx: &EvalContext<'_>) -> String {
    match operand {
        Operand::Constant(v) => format!("{}", v),
        _ => format!("{} {}", label(operand), fmt_value(resolve(operand, ctx))),
    }
}

fn label(operand: &Operand) -> String {
    match operand {
        Operand::Price => "price".to_string(),
        Operand::Score => "score".to_string(),
        Operand::PositionReturn => "position return".to_string(),
        Operand::Constant(v) => format!("{}", v),
        Operand::Field(field) => field.to_string(),
        Operand::Relative { value, base } => format!("{} vs {}", label(value), label(base)),
        Operand::Spread(left, right) => format!("|{} - {}|", label(left), label(right)),
        Operand::BandPosition => "BB position".to_string(),
    }
}

fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}

/// Ordered (rule, outcome) rows; the first row that holds decides.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable<T> {
    rows: Vec<(Rule, T)>,
    fallback: T,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableMatch<'t, T> {
    pub outcome: &'t T,
    /// Index of the deciding row, `None` when the fallback applied.
    pub row: Option<usize>,
    /// Rows skipped because they could not be evaluated.
    pub undefined_rows: usize,
}

impl<T> ThresholdTable<T> {
    pub fn new(rows: Vec<(Rule, T)>, fallback: T) -> Self {
        Self { rows, fallback }
    }

    pub(crate) fn rows(&self) -> &[(Rule, T)] {
        &self.rows
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> TableMatch<'_, T> {
        let mut undefined_rows = 0;
        for (i, (rule, outcome)) in self.rows.iter().enumerate() {
            match evaluate(rule, ctx) {
                Some(true) => {
                    return TableMatch {
                        outcome,
                        row: Some(i),
                        undefined_rows,
                    };
                }
                Some(false) => {}
                None => undefined_rows += 1,
            }
        }
        TableMatch {
            outcome: &self.fallback,
            row: None,
            undefined_rows,
        }
    }

    /// Snapshot fields any row reads.
    pub fn fields(&self) -> Vec<SnapshotField> {
        let mut out: Vec<SnapshotField> = Vec::new();
        for (rule, _) in &self.rows {
            for field in rule.fields() {
                if !out.contains(&field) {
                    out.push(field);
                }
            }
        }
        out
    }
}

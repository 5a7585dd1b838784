//! `predicate_compaction` (§4.3): when several `AND`-ed comparisons bound
//! the same column, keep only the most restrictive one per (column,
//! direction) pair — `x > 3 AND x > 1` becomes `x > 3`.

use std::collections::HashMap;
use strata_common::Result;
use strata_expr::expr::{ColumnRef, Expr};
use strata_expr::{ComparisonOp, LogicalPlan};

use crate::rule::OptimizerRule;

#[derive(Default)]
pub struct PredicateCompaction;

impl PredicateCompaction {
    pub fn new() -> Self {
        Self
    }
}

/// A comparison `column OP literal`, normalized so the column is always the
/// left-hand side (`3 < x` becomes `x > 3`).
struct Bound {
    column: ColumnRef,
    op: ComparisonOp,
    literal: Expr,
    original: Expr,
}

fn as_bound(expr: &Expr) -> Option<Bound> {
    match expr {
        Expr::Compare(op, l, r) => match (l.as_ref(), r.as_ref()) {
            (Expr::Column(c), Expr::Literal(_, _)) => {
                Some(Bound { column: *c, op: *op, literal: (**r).clone(), original: expr.clone() })
            }
            (Expr::Literal(_, _), Expr::Column(c)) => {
                Some(Bound { column: *c, op: flip(*op), literal: (**l).clone(), original: expr.clone() })
            }
            _ => None,
        },
        _ => None,
    }
}

fn flip(op: ComparisonOp) -> ComparisonOp {
    match op {
        ComparisonOp::Lt => ComparisonOp::Gt,
        ComparisonOp::LtEq => ComparisonOp::GtEq,
        ComparisonOp::Gt => ComparisonOp::Lt,
        ComparisonOp::GtEq => ComparisonOp::LtEq,
        other => other,
    }
}

fn literal_value(expr: &Expr) -> Option<&strata_common::ScalarValue> {
    match expr {
        Expr::Literal(v, _) => Some(v),
        _ => None,
    }
}

/// Keeps whichever of two same-direction bounds on the same column is more
/// restrictive. Returns `None` when they aren't comparable (leaves both).
fn tighter(a: &Bound, b: &Bound) -> Option<bool> {
    let (av, bv) = (literal_value(&a.literal)?, literal_value(&b.literal)?);
    let cmp = av.try_cmp(bv)?;
    Some(match a.op {
        ComparisonOp::Gt | ComparisonOp::GtEq => cmp == std::cmp::Ordering::Greater || cmp == std::cmp::Ordering::Equal,
        ComparisonOp::Lt | ComparisonOp::LtEq => cmp == std::cmp::Ordering::Less || cmp == std::cmp::Ordering::Equal,
        _ => return None,
    })
}

fn compact(conjuncts: &[Expr]) -> Vec<Expr> {
    let mut bounds: Vec<Bound> = Vec::new();
    let mut other: Vec<Expr> = Vec::new();
    for c in conjuncts {
        match as_bound(c) {
            Some(b) if matches!(b.op, ComparisonOp::Lt | ComparisonOp::LtEq | ComparisonOp::Gt | ComparisonOp::GtEq) => {
                bounds.push(b)
            }
            _ => other.push(c.clone()),
        }
    }

    // (column, direction key) -> index into `bounds` of the tightest bound seen so far
    let mut kept: HashMap<(ColumnRef, bool), usize> = HashMap::new();
    let mut keep_flags = vec![true; bounds.len()];
    for (idx, b) in bounds.iter().enumerate() {
        let is_lower = matches!(b.op, ComparisonOp::Gt | ComparisonOp::GtEq);
        let key = (b.column, is_lower);
        match kept.get(&key) {
            None => {
                kept.insert(key, idx);
            }
            Some(&existing) => match tighter(b, &bounds[existing]) {
                Some(true) => {
                    keep_flags[existing] = false;
                    kept.insert(key, idx);
                }
                Some(false) => {
                    keep_flags[idx] = false;
                }
                None => {}
            },
        }
    }

    let mut result: Vec<Expr> = bounds
        .into_iter()
        .zip(keep_flags)
        .filter(|(_, keep)| *keep)
        .map(|(b, _)| b.original)
        .collect();
    result.extend(other);
    result
}

impl OptimizerRule for PredicateCompaction {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let LogicalPlan::Filter { input, predicate } = plan else { return Ok(None) };
        let Expr::And(conjuncts) = predicate else { return Ok(None) };
        let compacted = compact(conjuncts);
        if compacted.len() == conjuncts.len() {
            return Ok(None);
        }
        Ok(Some(LogicalPlan::Filter { input: input.clone(), predicate: Expr::And(compacted) }))
    }

    fn name(&self) -> &str {
        "predicate_compaction"
    }
}

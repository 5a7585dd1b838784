//! `boolean_rewrite_inversion`/`_and_flatten`/`_demorgan_nary` (§4.3): pure
//! boolean-algebra simplifications that run before predicate pushdown so
//! pushdown sees flattened, non-negated conjunctions.

use strata_common::Result;
use strata_expr::expr::Expr;
use strata_expr::LogicalPlan;

use crate::rule::{ApplyOrder, OptimizerRule};
use crate::rules::expr_rewrite::{rewrite_bottom_up, rewrite_plan_exprs};

fn inversion(expr: &Expr) -> Expr {
    match expr {
        // NOT NOT e
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Not(e) => (**e).clone(),
            Expr::Compare(op, l, r) => match op.negate() {
                Some(negated) => Expr::Compare(negated, l.clone(), r.clone()),
                None => expr.clone(),
            },
            _ => expr.clone(),
        },
        _ => expr.clone(),
    }
}

#[derive(Default)]
pub struct BooleanRewriteInversion;

impl BooleanRewriteInversion {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for BooleanRewriteInversion {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let mut rewrite = |e: &Expr| rewrite_bottom_up(e, &mut |sub| Ok(inversion(&sub)));
        let (new_plan, changed) = rewrite_plan_exprs(plan, &mut rewrite)?;
        Ok(if changed { Some(new_plan) } else { None })
    }

    fn name(&self) -> &str {
        "boolean_rewrite_inversion"
    }
}

fn flatten_and(expr: &Expr) -> Expr {
    match expr {
        Expr::And(args) => {
            let mut flat = Vec::with_capacity(args.len());
            for a in args {
                match a {
                    Expr::And(inner) => flat.extend(inner.iter().cloned()),
                    other => flat.push(other.clone()),
                }
            }
            Expr::And(flat)
        }
        _ => expr.clone(),
    }
}

#[derive(Default)]
pub struct BooleanRewriteAndFlatten;

impl BooleanRewriteAndFlatten {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for BooleanRewriteAndFlatten {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let mut rewrite = |e: &Expr| rewrite_bottom_up(e, &mut |sub| Ok(flatten_and(&sub)));
        let (new_plan, changed) = rewrite_plan_exprs(plan, &mut rewrite)?;
        Ok(if changed { Some(new_plan) } else { None })
    }

    fn name(&self) -> &str {
        "boolean_rewrite_and_flatten"
    }
}

/// `NOT(a OR b OR ...)` -> `AND(NOT a, NOT b, ...)`. Run after flattening so
/// a nested `OR` chain has already been merged into one n-ary node.
fn demorgan_nary(expr: &Expr) -> Expr {
    match expr {
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Or(args) => Expr::And(args.iter().map(|a| Expr::Not(Box::new(a.clone()))).collect()),
            _ => expr.clone(),
        },
        _ => expr.clone(),
    }
}

#[derive(Default)]
pub struct BooleanRewriteDemorganNary;

impl BooleanRewriteDemorganNary {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for BooleanRewriteDemorganNary {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let mut rewrite = |e: &Expr| rewrite_bottom_up(e, &mut |sub| Ok(demorgan_nary(&sub)));
        let (new_plan, changed) = rewrite_plan_exprs(plan, &mut rewrite)?;
        Ok(if changed { Some(new_plan) } else { None })
    }

    fn name(&self) -> &str {
        "boolean_rewrite_demorgan_nary"
    }

    fn apply_order(&self) -> ApplyOrder {
        ApplyOrder::BottomUp
    }
}

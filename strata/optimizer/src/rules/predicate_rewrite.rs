//! `predicate_rewriter_*` (§4.3): shape-driven rewrites of specific function
//! calls and `CASE` idioms into cheaper equivalents, grounded in the
//! functions/expressions the compiled expression engine already knows how
//! to evaluate.

use strata_common::{LogicalType, Result, ScalarValue};
use strata_expr::expr::Expr;
use strata_expr::LogicalPlan;

use crate::rule::OptimizerRule;
use crate::rules::expr_rewrite::{rewrite_bottom_up, rewrite_plan_exprs};

fn starts_with_to_like(expr: &Expr) -> Expr {
    match expr {
        Expr::Call(name, args, _) if name.eq_ignore_ascii_case("STARTS_WITH") && args.len() == 2 => {
            if let Expr::Literal(ScalarValue::Utf8(Some(s)), ty) = &args[1] {
                let pattern = Expr::Literal(ScalarValue::Utf8(Some(format!("{s}%"))), ty.clone());
                return Expr::Like(Box::new(args[0].clone()), Box::new(pattern), false, false);
            }
            expr.clone()
        }
        _ => expr.clone(),
    }
}

#[derive(Default)]
pub struct PredicateRewriterStartsWithToLike;

impl PredicateRewriterStartsWithToLike {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for PredicateRewriterStartsWithToLike {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let mut rewrite = |e: &Expr| rewrite_bottom_up(e, &mut |sub| Ok(starts_with_to_like(&sub)));
        let (new_plan, changed) = rewrite_plan_exprs(plan, &mut rewrite)?;
        Ok(if changed { Some(new_plan) } else { None })
    }

    fn name(&self) -> &str {
        "predicate_rewriter_starts_with_to_like"
    }
}

fn ends_with_to_like(expr: &Expr) -> Expr {
    match expr {
        Expr::Call(name, args, _) if name.eq_ignore_ascii_case("ENDS_WITH") && args.len() == 2 => {
            if let Expr::Literal(ScalarValue::Utf8(Some(s)), ty) = &args[1] {
                let pattern = Expr::Literal(ScalarValue::Utf8(Some(format!("%{s}"))), ty.clone());
                return Expr::Like(Box::new(args[0].clone()), Box::new(pattern), false, false);
            }
            expr.clone()
        }
        _ => expr.clone(),
    }
}

#[derive(Default)]
pub struct PredicateRewriterEndsWithToLike;

impl PredicateRewriterEndsWithToLike {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for PredicateRewriterEndsWithToLike {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let mut rewrite = |e: &Expr| rewrite_bottom_up(e, &mut |sub| Ok(ends_with_to_like(&sub)));
        let (new_plan, changed) = rewrite_plan_exprs(plan, &mut rewrite)?;
        Ok(if changed { Some(new_plan) } else { None })
    }

    fn name(&self) -> &str {
        "predicate_rewriter_ends_with_to_like"
    }
}

/// `x LIKE '%literal%'` where `literal` itself has no `%`/`_` wildcards
/// degrades to a plain substring containment test — no pattern matching
/// needed.
fn like_to_contains(expr: &Expr) -> Expr {
    match expr {
        Expr::Like(input, pattern, case_insensitive, negated) if !case_insensitive => {
            if let Expr::Literal(ScalarValue::Utf8(Some(p)), ty) = pattern.as_ref() {
                if let Some(inner) = p.strip_prefix('%').and_then(|s| s.strip_suffix('%')) {
                    if !inner.is_empty() && !inner.contains(['%', '_']) {
                        let call = Expr::Call(
                            "CONTAINS".to_string(),
                            vec![(**input).clone(), Expr::Literal(ScalarValue::Utf8(Some(inner.to_string())), ty.clone())],
                            LogicalType::Boolean,
                        );
                        return if *negated { Expr::Not(Box::new(call)) } else { call };
                    }
                }
            }
            expr.clone()
        }
        _ => expr.clone(),
    }
}

#[derive(Default)]
pub struct PredicateRewriterReplaceLikeWithInString;

impl PredicateRewriterReplaceLikeWithInString {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for PredicateRewriterReplaceLikeWithInString {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let mut rewrite = |e: &Expr| rewrite_bottom_up(e, &mut |sub| Ok(like_to_contains(&sub)));
        let (new_plan, changed) = rewrite_plan_exprs(plan, &mut rewrite)?;
        Ok(if changed { Some(new_plan) } else { None })
    }

    fn name(&self) -> &str {
        "predicate_rewriter_replace_like_with_in_string"
    }
}

/// `CASE WHEN x IS NULL THEN c ELSE x END` -> `IFNULL(x, c)`, compiled the
/// same way as `IFNULL` itself: a two-argument `Coalesce`.
fn case_to_ifnull(expr: &Expr) -> Expr {
    match expr {
        Expr::Case(branches, Some(else_)) if branches.len() == 1 => {
            let branch = &branches[0];
            if let Expr::IsNull(target, false) = &branch.when {
                if exprs_match(target, else_) {
                    return Expr::Coalesce(vec![(**else_).clone(), branch.then.clone()]);
                }
            }
            expr.clone()
        }
        _ => expr.clone(),
    }
}

fn exprs_match(a: &Expr, b: &Expr) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

#[derive(Default)]
pub struct PredicateRewriterCaseToIfnull;

impl PredicateRewriterCaseToIfnull {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for PredicateRewriterCaseToIfnull {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let mut rewrite = |e: &Expr| rewrite_bottom_up(e, &mut |sub| Ok(case_to_ifnull(&sub)));
        let (new_plan, changed) = rewrite_plan_exprs(plan, &mut rewrite)?;
        Ok(if changed { Some(new_plan) } else { None })
    }

    fn name(&self) -> &str {
        "predicate_rewriter_case_to_ifnull"
    }
}

/// `v = ANY(col)` lowers to `ARRAY_CONTAINS(col, v)`; an OR-chain of such
/// checks against the same array column lowers to `ARRAY_CONTAINS_ANY`. A
/// corresponding AND-chain (every value in a fixed list must appear) lowers
/// to `ARRAY_CONTAINS_ALL`.
fn anyeq_to_contains(expr: &Expr) -> Expr {
    match expr {
        Expr::Call(name, args, _) if name.eq_ignore_ascii_case("ANY") && args.len() == 2 => Expr::Call(
            "ARRAY_CONTAINS".to_string(),
            vec![args[1].clone(), args[0].clone()],
            LogicalType::Boolean,
        ),
        Expr::Or(args) if args.len() > 1 && args.iter().all(is_any_eq) => {
            let Some((col, _)) = any_eq_parts(&args[0]) else { return expr.clone() };
            if args.iter().all(|a| any_eq_parts(a).is_some_and(|(c, _)| exprs_match(&c, &col))) {
                let mut call_args = vec![col];
                call_args.extend(args.iter().filter_map(|a| any_eq_parts(a).map(|(_, v)| v)));
                return Expr::Call("ARRAY_CONTAINS_ANY".to_string(), call_args, LogicalType::Boolean);
            }
            expr.clone()
        }
        Expr::And(args) if args.len() > 1 && args.iter().all(is_any_eq) => {
            let Some((col, _)) = any_eq_parts(&args[0]) else { return expr.clone() };
            if args.iter().all(|a| any_eq_parts(a).is_some_and(|(c, _)| exprs_match(&c, &col))) {
                let mut call_args = vec![col];
                call_args.extend(args.iter().filter_map(|a| any_eq_parts(a).map(|(_, v)| v)));
                return Expr::Call("ARRAY_CONTAINS_ALL".to_string(), call_args, LogicalType::Boolean);
            }
            expr.clone()
        }
        _ => expr.clone(),
    }
}

fn is_any_eq(expr: &Expr) -> bool {
    any_eq_parts(expr).is_some()
}

/// Recognizes `col = v` as an ANY-membership test, returning `(col, v)`.
fn any_eq_parts(expr: &Expr) -> Option<(Expr, Expr)> {
    match expr {
        Expr::Compare(strata_expr::ComparisonOp::Eq, l, r) => Some(((**l).clone(), (**r).clone())),
        _ => None,
    }
}

#[derive(Default)]
pub struct PredicateRewriterAnyeqToContains;

impl PredicateRewriterAnyeqToContains {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for PredicateRewriterAnyeqToContains {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let mut rewrite = |e: &Expr| rewrite_bottom_up(e, &mut |sub| Ok(anyeq_to_contains(&sub)));
        let (new_plan, changed) = rewrite_plan_exprs(plan, &mut rewrite)?;
        Ok(if changed { Some(new_plan) } else { None })
    }

    fn name(&self) -> &str {
        "predicate_rewriter_anyeq_to_contains"
    }
}

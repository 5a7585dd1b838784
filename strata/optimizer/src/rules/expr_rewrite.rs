//! A small shared helper: most expression-level rules (`constant_fold_*`,
//! `boolean_rewrite_*`, `predicate_rewriter_*`) want to walk every
//! expression a plan node carries, simplify it bottom-up, and report
//! whether anything changed. This centralizes that walk so each rule only
//! supplies the per-node simplification.

use strata_common::Result;
use strata_expr::expr::Expr;

/// Rewrites `expr` bottom-up, applying `f` to every node after its children
/// have already been rewritten.
pub fn rewrite_bottom_up(expr: &Expr, f: &mut impl FnMut(Expr) -> Result<Expr>) -> Result<Expr> {
    let children = expr.children();
    let rebuilt = if children.is_empty() {
        expr.clone()
    } else {
        let new_children = children.into_iter().map(|c| rewrite_bottom_up(c, f)).collect::<Result<Vec<_>>>()?;
        expr.with_new_children(new_children)
    };
    f(rebuilt)
}

/// Applies `rewrite` to every `Expr` a plan node directly carries (a
/// `Filter`'s predicate, a `Project`'s expression list, a `Join`'s `on`
/// pairs and residual filter), returning the rebuilt node and whether
/// anything actually changed so the driver can count a firing.
pub fn rewrite_plan_exprs(
    plan: &strata_expr::LogicalPlan,
    rewrite: &mut impl FnMut(&Expr) -> Result<Expr>,
) -> Result<(strata_expr::LogicalPlan, bool)> {
    use strata_expr::LogicalPlan as LP;
    let mut changed = false;
    let mut once = |e: &Expr| -> Result<Expr> {
        let new_e = rewrite(e)?;
        if !exprs_equal(&new_e, e) {
            changed = true;
        }
        Ok(new_e)
    };

    let new_plan = match plan {
        LP::Filter { input, predicate } => LP::Filter { input: input.clone(), predicate: once(predicate)? },
        LP::Project { input, exprs, schema, hints } => LP::Project {
            input: input.clone(),
            exprs: exprs.iter().map(|e| once(e)).collect::<Result<Vec<_>>>()?,
            schema: schema.clone(),
            hints: hints.clone(),
        },
        LP::Join { left, right, join_type, on, filter, schema } => LP::Join {
            left: left.clone(),
            right: right.clone(),
            join_type: *join_type,
            on: on
                .iter()
                .map(|(l, r)| Ok((once(l)?, once(r)?)))
                .collect::<Result<Vec<_>>>()?,
            filter: filter.as_ref().map(|f| once(f)).transpose()?,
            schema: schema.clone(),
        },
        LP::Aggregate { input, group_by, aggregates, schema } => LP::Aggregate {
            input: input.clone(),
            group_by: group_by.iter().map(|e| once(e)).collect::<Result<Vec<_>>>()?,
            aggregates: aggregates
                .iter()
                .map(|a| {
                    Ok(strata_expr::AggregateExpr {
                        function: a.function.clone(),
                        arg: a.arg.as_ref().map(|e| once(e)).transpose()?,
                        distinct: a.distinct,
                        limit: a.limit,
                        alias: a.alias.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            schema: schema.clone(),
        },
        LP::Sort { input, exprs } => LP::Sort {
            input: input.clone(),
            exprs: exprs
                .iter()
                .map(|s| {
                    Ok(strata_expr::SortExpr { expr: once(&s.expr)?, direction: s.direction, nulls_first: s.nulls_first })
                })
                .collect::<Result<Vec<_>>>()?,
        },
        LP::Scan { dataset, schema, statistics, projection, filters, limit, hints } => LP::Scan {
            dataset: dataset.clone(),
            schema: schema.clone(),
            statistics: statistics.clone(),
            projection: projection.clone(),
            filters: filters.iter().map(|e| once(e)).collect::<Result<Vec<_>>>()?,
            limit: *limit,
            hints: hints.clone(),
        },
        other => other.clone(),
    };
    Ok((new_plan, changed))
}

fn exprs_equal(a: &Expr, b: &Expr) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

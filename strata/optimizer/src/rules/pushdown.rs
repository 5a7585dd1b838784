//! `predicate_pushdown`/`projection_pushdown`/`limit_pushdown` (§4.3): move
//! row- and column-restricting operators as close to the `Scan` as
//! possible, where a connector can act on them directly (§2's pushdown
//! contract). Must run after boolean simplification (conjunctions are
//! already flattened) and before the two column-pruning rules.

use std::collections::HashSet;
use strata_common::Result;
use strata_expr::expr::{ColumnRef, Expr};
use strata_expr::LogicalPlan;

use crate::rule::{ApplyOrder, OptimizerRule};

fn flatten_conjuncts(predicate: &Expr) -> Vec<Expr> {
    match predicate {
        Expr::And(args) => args.clone(),
        other => vec![other.clone()],
    }
}

fn conjoin(mut exprs: Vec<Expr>) -> Option<Expr> {
    match exprs.len() {
        0 => None,
        1 => Some(exprs.remove(0)),
        _ => Some(Expr::And(exprs)),
    }
}

fn referenced_indices(expr: &Expr) -> HashSet<usize> {
    expr.column_refs().into_iter().map(|c| c.index).collect()
}

/// Pushes a `Filter` sitting directly over a `Scan` into the scan's own
/// `filters` list, where the connector (or `FileScanOperator`'s residual
/// filter) can apply it without a separate `VectorFilter` operator.
fn push_into_scan(input: &LogicalPlan, predicate: &Expr) -> Option<LogicalPlan> {
    let LogicalPlan::Scan { dataset, schema, statistics, projection, filters, limit, hints } = input else {
        return None;
    };
    let mut new_filters = filters.clone();
    new_filters.extend(flatten_conjuncts(predicate));
    Some(LogicalPlan::Scan {
        dataset: dataset.clone(),
        schema: schema.clone(),
        statistics: statistics.clone(),
        projection: projection.clone(),
        filters: new_filters,
        limit: *limit,
        hints: hints.clone(),
    })
}

/// Splits a `Filter` sitting over a `Join` into conjuncts that only touch
/// one side's columns (pushed into a new `Filter` under that side) and a
/// residual that still needs both sides.
fn push_into_join(input: &LogicalPlan, predicate: &Expr) -> Option<LogicalPlan> {
    let LogicalPlan::Join { left, right, join_type, on, filter, schema } = input else { return None };
    // Only safe to push below outer join sides when the join preserves
    // every row from that side regardless of match — inner and semi/anti
    // joins qualify, left/right/full outer do not (a pushed predicate
    // would wrongly drop unmatched rows before the join can null-pad them).
    if !matches!(join_type, strata_expr::JoinType::Inner | strata_expr::JoinType::LeftSemi | strata_expr::JoinType::LeftAnti) {
        return None;
    }
    let left_width = left.schema().len();
    let conjuncts = flatten_conjuncts(predicate);
    let mut left_preds = Vec::new();
    let mut right_preds = Vec::new();
    let mut residual = Vec::new();
    for c in conjuncts {
        let refs = referenced_indices(&c);
        if refs.iter().all(|&i| i < left_width) {
            left_preds.push(c);
        } else if refs.iter().all(|&i| i >= left_width) {
            right_preds.push(shift_columns(&c, left_width));
        } else {
            residual.push(c);
        }
    }
    if left_preds.is_empty() && right_preds.is_empty() {
        return None;
    }
    let new_left = match conjoin(left_preds) {
        Some(p) => Box::new(LogicalPlan::Filter { input: left.clone(), predicate: p }),
        None => left.clone(),
    };
    let new_right = match conjoin(right_preds) {
        Some(p) => Box::new(LogicalPlan::Filter { input: right.clone(), predicate: p }),
        None => right.clone(),
    };
    let join = LogicalPlan::Join {
        left: new_left,
        right: new_right,
        join_type: *join_type,
        on: on.clone(),
        filter: filter.clone(),
        schema: schema.clone(),
    };
    Some(match conjoin(residual) {
        Some(p) => LogicalPlan::Filter { input: Box::new(join), predicate: p },
        None => join,
    })
}

/// Rewrites column indices down by `offset`, for a predicate moving from a
/// join's merged schema to its right child's own schema.
fn shift_columns(expr: &Expr, offset: usize) -> Expr {
    match expr {
        Expr::Column(c) => Expr::Column(ColumnRef { source: c.source, index: c.index - offset }),
        other => {
            let children = other.children().into_iter().map(|c| shift_columns(c, offset)).collect();
            other.with_new_children(children)
        }
    }
}

#[derive(Default)]
pub struct PredicatePushdown;

impl PredicatePushdown {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for PredicatePushdown {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let LogicalPlan::Filter { input, predicate } = plan else { return Ok(None) };
        if let Some(pushed) = push_into_scan(input, predicate) {
            return Ok(Some(pushed));
        }
        if let Some(pushed) = push_into_join(input, predicate) {
            return Ok(Some(pushed));
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "predicate_pushdown"
    }

    fn apply_order(&self) -> ApplyOrder {
        ApplyOrder::TopDown
    }
}

/// Narrows a `Scan`'s projection to exactly the columns a parent `Project`
/// needs, when the scan has no existing projection and no `NO_PUSH_PROJECTION`
/// hint (§3.1's scan hint contract).
fn push_projection_into_scan(exprs: &[Expr], input: &LogicalPlan) -> Option<LogicalPlan> {
    let LogicalPlan::Scan { dataset, schema, statistics, projection, filters, limit, hints } = input else {
        return None;
    };
    if projection.is_some() || hints.contains(strata_expr::HINT_NO_PUSH_PROJECTION) {
        return None;
    }
    let mut needed: Vec<usize> = exprs.iter().flat_map(referenced_indices).collect();
    needed.sort_unstable();
    needed.dedup();
    if needed.len() >= schema.len() {
        return None;
    }
    Some(LogicalPlan::Scan {
        dataset: dataset.clone(),
        schema: schema.clone(),
        statistics: statistics.clone(),
        projection: Some(needed),
        filters: filters.clone(),
        limit: *limit,
        hints: hints.clone(),
    })
}

#[derive(Default)]
pub struct ProjectionPushdown;

impl ProjectionPushdown {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for ProjectionPushdown {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let LogicalPlan::Project { input, exprs, schema, hints } = plan else { return Ok(None) };
        let Some(new_scan) = push_projection_into_scan(exprs, input) else { return Ok(None) };
        Ok(Some(LogicalPlan::Project {
            input: Box::new(new_scan),
            exprs: exprs.clone(),
            schema: schema.clone(),
            hints: hints.clone(),
        }))
    }

    fn name(&self) -> &str {
        "projection_pushdown"
    }

    fn apply_order(&self) -> ApplyOrder {
        ApplyOrder::TopDown
    }
}

/// Pushes a `Limit` down into a `Scan`'s own `limit` field when everything
/// between them preserves row identity (`Project`, or a `Filter`/`Sort` is
/// NOT safe to skip past — a filter can drop rows, a sort can reorder them,
/// so the row-count upper bound they'd pass through no longer bounds the
/// scan). Also fuses a `Limit` directly over a `Sort` into nothing here —
/// that fusion is the physical planner's job (`HeapSort(k)`), not a logical
/// rewrite, since `HeapSort` is a physical operator.
fn push_limit(input: &LogicalPlan, limit: usize) -> Option<LogicalPlan> {
    match input {
        LogicalPlan::Scan { dataset, schema, statistics, projection, filters, limit: existing, hints } => {
            let new_limit = Some(existing.map_or(limit, |e| e.min(limit)));
            Some(LogicalPlan::Scan {
                dataset: dataset.clone(),
                schema: schema.clone(),
                statistics: statistics.clone(),
                projection: projection.clone(),
                filters: filters.clone(),
                limit: new_limit,
                hints: hints.clone(),
            })
        }
        LogicalPlan::Project { input: inner, exprs, schema, hints } => {
            push_limit(inner, limit).map(|new_inner| LogicalPlan::Project {
                input: Box::new(new_inner),
                exprs: exprs.clone(),
                schema: schema.clone(),
                hints: hints.clone(),
            })
        }
        _ => None,
    }
}

#[derive(Default)]
pub struct LimitPushdown;

impl LimitPushdown {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for LimitPushdown {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let LogicalPlan::Limit { input, limit: Some(limit), offset } = plan else { return Ok(None) };
        if *offset != 0 {
            // A nonzero offset means the scan would need to know to skip
            // rows too; leave the Limit node in place above the source.
            return Ok(None);
        }
        let Some(new_input) = push_limit(input, *limit) else { return Ok(None) };
        Ok(Some(LogicalPlan::Limit { input: Box::new(new_input), limit: Some(*limit), offset: *offset }))
    }

    fn name(&self) -> &str {
        "limit_pushdown"
    }

    fn apply_order(&self) -> ApplyOrder {
        ApplyOrder::TopDown
    }
}

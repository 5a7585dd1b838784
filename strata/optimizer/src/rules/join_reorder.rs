//! `inner_join_smallest_table_left`/`inner_join_correlated_filter` (§4.3):
//! statistics-dependent join shaping. Both rules are no-ops whenever the
//! relevant `RelationStatistics` are absent, per the optimizer's safety
//! clause — they never guess.

use strata_common::{LogicalType, OrderedBound, Result, ScalarValue};
use strata_expr::expr::{ColumnRef, Expr};
use strata_expr::{JoinType, LogicalPlan};

use crate::rule::{ApplyOrder, OptimizerRule};

/// Best-effort row count for a subtree: only `Scan` and pass-through single
/// input nodes report one; anything stats can't speak for returns `None`,
/// which disables the reordering rule for that join rather than guessing.
fn estimated_rows(plan: &LogicalPlan) -> Option<u64> {
    match plan {
        LogicalPlan::Scan { statistics, limit, .. } => {
            let base = statistics.record_count?;
            Some(match limit {
                Some(l) => base.min(*l as u64),
                None => base,
            })
        }
        LogicalPlan::Project { input, .. } | LogicalPlan::Limit { input, .. } => estimated_rows(input),
        _ => None,
    }
}

/// Swaps an inner join's children so the smaller side is on the left,
/// matching the physical planner's convention of building the hash table
/// from the left input. A trailing `Project` restores the original output
/// column order so nothing above the join observes the swap.
#[derive(Default)]
pub struct InnerJoinSmallestTableLeft;

impl InnerJoinSmallestTableLeft {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for InnerJoinSmallestTableLeft {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let LogicalPlan::Join { left, right, join_type: JoinType::Inner, on, filter, schema } = plan else {
            return Ok(None);
        };
        let (Some(left_rows), Some(right_rows)) = (estimated_rows(left), estimated_rows(right)) else {
            return Ok(None);
        };
        if right_rows >= left_rows {
            return Ok(None);
        }

        let left_width = left.schema().len() as i64;
        let right_width = right.schema().len() as i64;
        // `on` pairs index into each side's own schema (the physical join
        // compiles build/probe keys against each side separately), so
        // swapping sides is just swapping each pair.
        let swapped_on = on.iter().map(|(l, r)| (r.clone(), l.clone())).collect::<Vec<_>>();
        // `filter` (a residual non-equi predicate) indexes into the merged
        // schema directly; swap its halves the same way `on` pairs are.
        let swapped_filter = filter.as_ref().map(|f| swap_merged_schema_refs(f, left_width, right_width));

        let new_schema = right.schema().join(&left.schema());
        let swapped_join = LogicalPlan::Join {
            left: right.clone(),
            right: left.clone(),
            join_type: JoinType::Inner,
            on: swapped_on,
            filter: swapped_filter,
            schema: new_schema,
        };

        // Restore the pre-swap column order: original layout was
        // [left fields][right fields]; post-swap it's [right][left].
        let restore_exprs: Vec<Expr> = (0..left_width)
            .map(|i| Expr::column((right_width + i) as usize))
            .chain((0..right_width).map(|i| Expr::column(i as usize)))
            .collect();
        Ok(Some(LogicalPlan::Project {
            input: Box::new(swapped_join),
            exprs: restore_exprs,
            schema: schema.clone(),
            hints: Default::default(),
        }))
    }

    fn name(&self) -> &str {
        "inner_join_smallest_table_left"
    }

    fn apply_order(&self) -> ApplyOrder {
        ApplyOrder::BottomUp
    }
}

fn swap_merged_schema_refs(expr: &Expr, left_width: i64, right_width: i64) -> Expr {
    match expr {
        Expr::Column(c) => {
            let idx = c.index as i64;
            let new_idx = if idx < left_width { idx + right_width } else { idx - left_width };
            Expr::Column(ColumnRef { source: c.source, index: new_idx as usize })
        }
        other => {
            let children = other.children().into_iter().map(|c| swap_merged_schema_refs(c, left_width, right_width)).collect();
            other.with_new_children(children)
        }
    }
}

/// When an inner join's equi-key has known, exactly-invertible `Int64`
/// bounds on one side (only integer bounds survive `OrderedBound`'s
/// encoding losslessly — floats and strings are one-way hashes), derives a
/// `BETWEEN`-style range filter on the other side from that range. The
/// derived filter is redundant with the join itself but lets
/// `predicate_pushdown` carry it straight into a `Scan`/connector on a
/// later pass, pruning rows the join would otherwise have discarded anyway.
#[derive(Default)]
pub struct InnerJoinCorrelatedFilter;

impl InnerJoinCorrelatedFilter {
    pub fn new() -> Self {
        Self
    }
}

fn column_name_and_stats<'a>(
    plan: &'a LogicalPlan,
    column_index: usize,
) -> Option<(&'a str, &'a strata_common::ColumnStatistics, &'a LogicalType)> {
    let LogicalPlan::Scan { schema, statistics, .. } = unwrap_passthrough(plan) else { return None };
    let field = schema.field(column_index);
    if !matches!(field.logical_type, LogicalType::Int64) {
        return None;
    }
    let stats = statistics.columns.get(&field.name)?;
    Some((&field.name, stats, &field.logical_type))
}

fn unwrap_passthrough(plan: &LogicalPlan) -> &LogicalPlan {
    match plan {
        LogicalPlan::Project { input, .. } | LogicalPlan::Limit { input, .. } => unwrap_passthrough(input),
        other => other,
    }
}

impl OptimizerRule for InnerJoinCorrelatedFilter {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let LogicalPlan::Join { left, right, join_type: JoinType::Inner, on, filter, schema } = plan else {
            return Ok(None);
        };
        let [(left_key, right_key)] = on.as_slice() else { return Ok(None) };
        let (Expr::Column(lc), Expr::Column(rc)) = (left_key, right_key) else { return Ok(None) };

        let (smaller_side, smaller_col, larger_is_left) = match (estimated_rows(left), estimated_rows(right)) {
            (Some(l), Some(r)) if l <= r => (left.as_ref(), lc.index, false),
            (Some(l), Some(r)) if r < l => (right.as_ref(), rc.index, true),
            _ => return Ok(None),
        };
        let Some((_, stats, ty)) = column_name_and_stats(smaller_side, smaller_col) else { return Ok(None) };
        let (Some(min), Some(max)) = (stats.min, stats.max) else { return Ok(None) };

        let larger_col = if larger_is_left { lc.index } else { rc.index };
        let larger_offset = if larger_is_left { 0 } else { left.schema().len() };
        let bound_expr = Expr::column(larger_col + larger_offset);
        let lo = Expr::lit(ScalarValue::Int64(Some(ordered_bound_to_i64(min))));
        let hi = Expr::lit(ScalarValue::Int64(Some(ordered_bound_to_i64(max))));
        let range = Expr::Between(Box::new(bound_expr), Box::new(lo), Box::new(hi));
        let _ = ty;

        // Fold into the join's own residual filter (rather than wrapping in
        // a new Filter node above) so re-running this rule to fixpoint is
        // idempotent: once the range is already one of the AND'd conjuncts,
        // `already_present` stops it firing again.
        let range_fingerprint = format!("{range:?}");
        let already_present = match filter {
            Some(Expr::And(conjuncts)) => conjuncts.iter().any(|c| format!("{c:?}") == range_fingerprint),
            Some(other) => format!("{other:?}") == range_fingerprint,
            None => false,
        };
        if already_present {
            return Ok(None);
        }
        let new_filter = match filter {
            Some(Expr::And(conjuncts)) => {
                let mut conjuncts = conjuncts.clone();
                conjuncts.push(range);
                Expr::And(conjuncts)
            }
            Some(other) => Expr::And(vec![other.clone(), range]),
            None => range,
        };

        Ok(Some(LogicalPlan::Join {
            left: left.clone(),
            right: right.clone(),
            join_type: JoinType::Inner,
            on: on.clone(),
            filter: Some(new_filter),
            schema: schema.clone(),
        }))
    }

    fn name(&self) -> &str {
        "inner_join_correlated_filter"
    }

    fn apply_order(&self) -> ApplyOrder {
        ApplyOrder::BottomUp
    }
}

fn ordered_bound_to_i64(bound: OrderedBound) -> i64 {
    bound.0 as i64
}

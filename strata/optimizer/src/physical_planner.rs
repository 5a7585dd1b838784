//! Lowers an optimized `LogicalPlan` into a `strata_physical_plan::PhysicalPlan`
//! (§4.4). Scan pushdown reasons about each filter conjunct independently
//! (§8.1): a conjunct the connector's `Capabilities` and DNF shape let it
//! fully honor is sent down in the `ScanRequest` and dropped from the
//! physical plan; anything else (unsupported shape, `LIKE`, a connector
//! that doesn't advertise pushdown) is kept as a residual `VectorFilter`
//! above the scan so the result is correct regardless of what the
//! connector actually did with the hint.

use std::sync::Arc;

use strata_common::{LogicalType, Result, Schema};
use strata_connectors::{Capabilities, Connector, ConnectorLookup, DnfComparison, DnfOp, DnfPredicate, ScanRequest};
use strata_expr::expr::Expr;
use strata_expr::operator::ComparisonOp;
use strata_expr::{AggregateExpr, JoinType, LogicalPlan, SortDirection};
use strata_physical_expr::{compile, ColumnExpr, FunctionRegistry, PhysicalExprRef};
use strata_physical_plan::aggregate::accumulator::scalar_at;
use strata_physical_plan::{
    AggregateFunction, AggregateSlot, ConnectorScanOperator, CrossJoinUnnestOperator, DistinctOperator,
    HashAggregateOperator, HashJoinOperator, HeapSortOperator, InMemorySourceOperator, JoinKind, LimitOperator,
    NestedLoopJoinOperator, PhysicalPlan, SemiJoinOperator, SortKey, UnionAllOperator, VectorFilterOperator,
    VectorProjectOperator,
};

pub struct PhysicalPlanner {
    connectors: Arc<dyn ConnectorLookup>,
    registry: FunctionRegistry,
}

impl PhysicalPlanner {
    pub fn new(connectors: Arc<dyn ConnectorLookup>) -> Self {
        Self { connectors, registry: FunctionRegistry::new() }
    }

    pub fn plan(&self, logical: &LogicalPlan) -> Result<PhysicalPlan> {
        match logical {
            LogicalPlan::Scan { dataset, schema, filters, projection, limit, .. } => {
                self.plan_scan(dataset, schema, filters, projection, *limit)
            }
            LogicalPlan::Filter { input, predicate } => {
                let child = self.plan(input)?;
                let compiled = compile(predicate, &input.schema(), &self.registry)?;
                Ok(Box::new(VectorFilterOperator::new(child, compiled)))
            }
            LogicalPlan::Project { input, exprs, schema, .. } => {
                let child = self.plan(input)?;
                let input_schema = input.schema();
                let compiled = exprs.iter().map(|e| compile(e, &input_schema, &self.registry)).collect::<Result<Vec<_>>>()?;
                Ok(Box::new(VectorProjectOperator::new(child, compiled, Arc::new(schema.clone()))))
            }
            LogicalPlan::Aggregate { input, group_by, aggregates, schema } => {
                self.plan_aggregate(input, group_by, aggregates, schema)
            }
            LogicalPlan::Join { left, right, join_type, on, filter, schema } => {
                self.plan_join(left, right, *join_type, on, filter, schema)
            }
            LogicalPlan::CrossJoin { left, right, schema } => {
                let left_width = left.schema().len();
                let right_width = right.schema().len();
                let build = self.plan(left)?;
                let probe = self.plan(right)?;
                let actual_schema = right.schema().join(&left.schema());
                let joined = NestedLoopJoinOperator::new(build, probe, None, Arc::new(actual_schema));
                Ok(restore_left_right_order(Box::new(joined), right_width, left_width, schema))
            }
            LogicalPlan::Sort { input, exprs } => {
                // A Sort with no enclosing Limit: HeapSort with k = None
                // (buffer, sort, return everything — see operators::sort).
                let child = self.plan(input)?;
                let keys = self.compile_sort_keys(exprs, &input.schema())?;
                Ok(Box::new(HeapSortOperator::new(child, keys, None, Arc::new(input.schema()))))
            }
            LogicalPlan::Limit { input, limit, offset } => self.plan_limit(input, *limit, *offset),
            LogicalPlan::Distinct { input } => {
                let schema = Arc::new(input.schema());
                let child = self.plan(input)?;
                Ok(Box::new(DistinctOperator::new(child, schema)))
            }
            LogicalPlan::Union { inputs, schema } => {
                let children = inputs.iter().map(|p| self.plan(p)).collect::<Result<Vec<_>>>()?;
                Ok(Box::new(UnionAllOperator::new(children, Arc::new(schema.clone()))))
            }
            LogicalPlan::Unnest { input, expr, schema, .. } => {
                let child = self.plan(input)?;
                let Expr::Column(col) = expr else {
                    return Err(strata_common::internal_error("UNNEST target must be a bare column reference"));
                };
                Ok(Box::new(CrossJoinUnnestOperator::new(child, col.index, Arc::new(schema.clone()))))
            }
            LogicalPlan::Values { rows, schema } => self.plan_values(rows, schema),
        }
    }

    fn plan_scan(
        &self,
        dataset: &strata_expr::DatasetRef,
        schema: &Schema,
        filters: &[Expr],
        projection: &Option<Vec<usize>>,
        limit: Option<usize>,
    ) -> Result<PhysicalPlan> {
        let connector = self.connectors.lookup(&dataset.connector_key)?;
        let capabilities = connector.capabilities();

        // A conjunct only drops out of the physical plan if the connector is
        // guaranteed to have already filtered every row by it (§8.1); the
        // rest — anything it can't fully honor, or doesn't support at all —
        // still needs the residual filter below.
        let residual: Vec<Expr> = filters.iter().filter(|f| !is_fully_pushed(f, schema, &capabilities)).cloned().collect();

        // Every column a residual filter touches must survive narrowing even
        // if the logical projection rule never saw that filter (the two
        // rules run independently), or the residual filter below would have
        // nothing to evaluate against.
        let mut proj_indices: Vec<usize> = projection.clone().unwrap_or_else(|| (0..schema.len()).collect());
        for f in &residual {
            for c in f.column_refs() {
                if !proj_indices.contains(&c.index) {
                    proj_indices.push(c.index);
                }
            }
        }
        proj_indices.sort_unstable();
        proj_indices.dedup();
        let narrowed_schema = schema.project(&proj_indices);
        let remap = |original: usize| -> usize {
            proj_indices.iter().position(|&i| i == original).expect("pulled into proj_indices above")
        };

        let dnf = translate_conjuncts(filters, schema);
        let request = ScanRequest {
            projection: projection.as_ref().map(|_| proj_indices.iter().map(|&i| schema.field(i).name.clone()).collect()),
            predicate: dnf,
            limit,
            temporal: dataset.temporal.as_ref().map(translate_temporal),
        };
        let mut plan: PhysicalPlan = Box::new(ConnectorScanOperator::new(connector, request, Arc::new(narrowed_schema.clone())));

        if !residual.is_empty() {
            let remapped = remap_all(&residual, &remap);
            let predicate = conjoin(remapped);
            let compiled = compile(&predicate, &narrowed_schema, &self.registry)?;
            plan = Box::new(VectorFilterOperator::new(plan, compiled));
        }

        // Drop the extra filter-only columns this function pulled in, and
        // restore the caller's requested column order.
        if let Some(requested) = projection {
            if requested != &proj_indices {
                let final_idx: Vec<usize> = requested.iter().map(|&i| remap(i)).collect();
                let out_schema = narrowed_schema.project(&final_idx);
                let exprs: Vec<PhysicalExprRef> = final_idx
                    .iter()
                    .map(|&i| Arc::new(ColumnExpr::new(i, narrowed_schema.field(i).logical_type.clone())) as PhysicalExprRef)
                    .collect();
                plan = Box::new(VectorProjectOperator::new(plan, exprs, Arc::new(out_schema)));
            }
        }

        if let Some(l) = limit {
            plan = Box::new(LimitOperator::new(plan, Some(l), 0));
        }
        Ok(plan)
    }

    fn plan_aggregate(
        &self,
        input: &LogicalPlan,
        group_by: &[Expr],
        aggregates: &[AggregateExpr],
        schema: &Schema,
    ) -> Result<PhysicalPlan> {
        let child = self.plan(input)?;
        let input_schema = input.schema();
        let group_exprs = group_by.iter().map(|e| compile(e, &input_schema, &self.registry)).collect::<Result<Vec<_>>>()?;
        let slots = aggregates
            .iter()
            .map(|a| {
                let arg = a.arg.as_ref().map(|e| compile(e, &input_schema, &self.registry)).transpose()?;
                let function = aggregate_function(&a.function, a.distinct, a.limit)?;
                let output_type = schema
                    .fields()
                    .iter()
                    .find(|f| f.name == a.alias)
                    .map(|f| f.logical_type.clone())
                    .unwrap_or(LogicalType::Int64);
                Ok(AggregateSlot { function, arg, output_type })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(HashAggregateOperator::new(child, group_exprs, slots, Arc::new(schema.clone()))))
    }

    fn plan_join(
        &self,
        left: &LogicalPlan,
        right: &LogicalPlan,
        join_type: JoinType,
        on: &[(Expr, Expr)],
        filter: &Option<Expr>,
        schema: &Schema,
    ) -> Result<PhysicalPlan> {
        let left_plan = self.plan(left)?;
        let right_plan = self.plan(right)?;
        let left_schema = left.schema();
        let right_schema = right.schema();

        match join_type {
            JoinType::LeftSemi | JoinType::LeftAnti => {
                // `SemiJoinOperator::new(build_input, probe_input, ...)`
                // probes the left input (kept/dropped based on a match)
                // against a build side drawn from the right.
                let build_keys = on.iter().map(|(_, r)| compile(r, &right_schema, &self.registry)).collect::<Result<Vec<_>>>()?;
                let probe_keys = on.iter().map(|(l, _)| compile(l, &left_schema, &self.registry)).collect::<Result<Vec<_>>>()?;
                let negate = join_type == JoinType::LeftAnti;
                let op = SemiJoinOperator::new(right_plan, left_plan, build_keys, probe_keys, negate, Arc::new(schema.clone()));
                Ok(Box::new(op) as PhysicalPlan)
            }
            _ if filter.is_some() || on.is_empty() => {
                let merged = left_schema.join(&right_schema);
                let mut predicate_parts: Vec<Expr> =
                    on.iter().map(|(l, r)| Expr::Compare(ComparisonOp::Eq, Box::new(l.clone()), Box::new(shift_rhs(r, left_schema.len())))).collect();
                if let Some(f) = filter {
                    predicate_parts.push(f.clone());
                }
                // Left is build, right is probe (matches `HashJoinOperator`
                // below so a plan that degrades from hash- to nested-loop
                // join keeps the same build side); the operator emits
                // `[probe][build]` = `[right][left]`, so the predicate is
                // reindexed out of `merged`'s `[left][right]` layout, and the
                // result is reordered back to `schema` afterward.
                let left_width = left_schema.len();
                let right_width = right_schema.len();
                let actual_merged = right_schema.join(&left_schema);
                let predicate = if predicate_parts.is_empty() {
                    None
                } else {
                    let reindexed = reindex_probe_build(&conjoin(predicate_parts), left_width, right_width);
                    Some(compile(&reindexed, &actual_merged, &self.registry)?)
                };
                let joined = NestedLoopJoinOperator::new(left_plan, right_plan, predicate, Arc::new(actual_merged));
                Ok(restore_left_right_order(Box::new(joined), right_width, left_width, schema))
            }
            _ => {
                // `HashJoinOperator` concatenates output columns as
                // `[probe][build]`; the planner builds from the left child
                // (so `inner_join_smallest_table_left` actually buys a
                // smaller materialized build side) and probes the right,
                // then reorders the raw `[right][left]` output back to
                // `schema`'s `[left][right]` layout. `JoinKind` is mirrored
                // accordingly: a `LEFT` join keeps unmatched *build* (left)
                // rows, a `RIGHT` join keeps unmatched *probe* (right) rows.
                let build_keys = on.iter().map(|(l, _)| compile(l, &left_schema, &self.registry)).collect::<Result<Vec<_>>>()?;
                let probe_keys = on.iter().map(|(_, r)| compile(r, &right_schema, &self.registry)).collect::<Result<Vec<_>>>()?;
                let kind = match join_type {
                    JoinType::Inner => JoinKind::Inner,
                    JoinType::Left => JoinKind::Right,
                    JoinType::Right => JoinKind::Left,
                    JoinType::Full => JoinKind::Full,
                    JoinType::LeftSemi | JoinType::LeftAnti => unreachable!("handled above"),
                };
                let actual_schema = right_schema.join(&left_schema);
                let joined = HashJoinOperator::new(left_plan, right_plan, build_keys, probe_keys, kind, Arc::new(actual_schema));
                Ok(restore_left_right_order(Box::new(joined), right_schema.len(), left_schema.len(), schema))
            }
        }
    }

    fn plan_limit(&self, input: &LogicalPlan, limit: Option<usize>, offset: usize) -> Result<PhysicalPlan> {
        // Fuse `Limit` directly over `Sort` into one `HeapSort(k)` pass
        // (§4.4): avoids buffering, fully sorting, then separately
        // truncating when the caller only ever wanted the top k rows.
        if offset == 0 {
            if let (LogicalPlan::Sort { input: sort_input, exprs }, Some(k)) = (input, limit) {
                let child = self.plan(sort_input)?;
                let keys = self.compile_sort_keys(exprs, &sort_input.schema())?;
                return Ok(Box::new(HeapSortOperator::new(child, keys, Some(k), Arc::new(sort_input.schema()))));
            }
        }
        let child = self.plan(input)?;
        Ok(Box::new(LimitOperator::new(child, limit, offset)))
    }

    fn plan_values(&self, rows: &[Vec<Expr>], schema: &Schema) -> Result<PhysicalPlan> {
        let empty_schema = Schema::empty();
        let arrow_schema = Arc::new(empty_schema.to_arrow());
        let options = arrow::record_batch::RecordBatchOptions::new().with_row_count(Some(1));
        let probe = arrow::record_batch::RecordBatch::try_new_with_options(arrow_schema, vec![], &options)?;
        let probe_batch = strata_common::Batch::new(Arc::new(empty_schema.clone()), probe);

        let mut columns: Vec<Vec<strata_common::ScalarValue>> = vec![Vec::with_capacity(rows.len()); schema.len()];
        for row in rows {
            for (col_idx, expr) in row.iter().enumerate() {
                let compiled = compile(expr, &empty_schema, &self.registry)?;
                let value = match compiled.evaluate(&probe_batch)? {
                    strata_physical_expr::ColumnarValue::Scalar(v) => v,
                    strata_physical_expr::ColumnarValue::Array(a) => scalar_at(&a, 0)?,
                };
                columns[col_idx].push(value);
            }
        }
        let arrays = columns
            .iter()
            .zip(schema.fields())
            .map(|(values, field)| strata_physical_expr::scalar_vec_to_array(values, &field.logical_type))
            .collect::<Result<Vec<_>>>()?;
        let arrow_schema = Arc::new(schema.to_arrow());
        let record = arrow::record_batch::RecordBatch::try_new(arrow_schema, arrays)?;
        let batch = strata_common::Batch::new(Arc::new(schema.clone()), record);
        Ok(Box::new(InMemorySourceOperator::new(Arc::new(schema.clone()), vec![batch])))
    }

    fn compile_sort_keys(&self, exprs: &[strata_expr::SortExpr], schema: &Schema) -> Result<Vec<SortKey>> {
        exprs
            .iter()
            .map(|s| {
                Ok(SortKey {
                    expr: compile(&s.expr, schema, &self.registry)?,
                    ascending: s.direction == SortDirection::Asc,
                    nulls_first: s.nulls_first,
                })
            })
            .collect()
    }
}

/// Reindexes an expression compiled against a `[left][right]` merged schema
/// (width `left_width`/`right_width`) into the `[right][left]` layout
/// `HashJoinOperator`/`NestedLoopJoinOperator` actually emit when built from
/// the left side.
fn reindex_probe_build(expr: &Expr, left_width: usize, right_width: usize) -> Expr {
    match expr {
        Expr::Column(c) => {
            let new_index = if c.index < left_width { right_width + c.index } else { c.index - left_width };
            Expr::Column(strata_expr::ColumnRef { source: c.source, index: new_index })
        }
        other => {
            let children = other.children().into_iter().map(|c| reindex_probe_build(c, left_width, right_width)).collect();
            other.with_new_children(children)
        }
    }
}

/// Wraps a join operator whose raw output is `[right][left]` (built from the
/// left side, per the physical planner's build-side convention) in a
/// projection restoring the caller's expected `[left][right]` column order.
fn restore_left_right_order(plan: PhysicalPlan, right_width: usize, left_width: usize, schema: &Schema) -> PhysicalPlan {
    let exprs: Vec<PhysicalExprRef> = (0..left_width)
        .map(|i| Arc::new(ColumnExpr::new(right_width + i, schema.field(i).logical_type.clone())) as PhysicalExprRef)
        .chain(
            (0..right_width)
                .map(|i| Arc::new(ColumnExpr::new(i, schema.field(left_width + i).logical_type.clone())) as PhysicalExprRef),
        )
        .collect();
    Box::new(VectorProjectOperator::new(plan, exprs, Arc::new(schema.clone())))
}

fn shift_rhs(expr: &Expr, offset: usize) -> Expr {
    match expr {
        Expr::Column(c) => Expr::Column(strata_expr::ColumnRef { source: c.source, index: c.index + offset }),
        other => {
            let children = other.children().into_iter().map(|c| shift_rhs(c, offset)).collect();
            other.with_new_children(children)
        }
    }
}

fn conjoin(mut exprs: Vec<Expr>) -> Expr {
    match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::And(exprs),
    }
}

fn remap_all(exprs: &[Expr], remap: &impl Fn(usize) -> usize) -> Vec<Expr> {
    exprs.iter().map(|e| remap_expr(e, remap)).collect()
}

fn remap_expr(expr: &Expr, remap: &impl Fn(usize) -> usize) -> Expr {
    match expr {
        Expr::Column(c) => Expr::Column(strata_expr::ColumnRef { source: c.source, index: remap(c.index) }),
        other => {
            let children = other.children().into_iter().map(|c| remap_expr(c, remap)).collect();
            other.with_new_children(children)
        }
    }
}

fn aggregate_function(name: &str, distinct: bool, limit: Option<usize>) -> Result<AggregateFunction> {
    Ok(match name.to_ascii_uppercase().as_str() {
        "COUNT_STAR" | "COUNT(*)" => AggregateFunction::CountStar,
        "COUNT" if distinct => AggregateFunction::CountDistinct,
        "COUNT" => AggregateFunction::Count,
        "SUM" => AggregateFunction::Sum,
        "MIN" => AggregateFunction::Min,
        "MAX" => AggregateFunction::Max,
        "AVG" => AggregateFunction::Avg,
        "ARRAY_AGG" => AggregateFunction::ArrayAgg { distinct, limit },
        "STDDEV" | "STDDEV_SAMP" => AggregateFunction::StdDev { sample: true },
        "STDDEV_POP" => AggregateFunction::StdDev { sample: false },
        "VARIANCE" | "VAR_SAMP" => AggregateFunction::Variance { sample: true },
        "VAR_POP" => AggregateFunction::Variance { sample: false },
        "ANY_VALUE" => AggregateFunction::AnyValue,
        "APPROXIMATE_MEDIAN" | "APPROX_MEDIAN" => AggregateFunction::ApproximateMedian,
        other => return Err(strata_common::internal_error(format!("unknown aggregate function {other}"))),
    })
}

/// Lowers the binder's connector-agnostic `FOR` clause selector into the
/// connector ABI's own type.
fn translate_temporal(selector: &strata_expr::TemporalSelector) -> strata_connectors::TemporalSelector {
    match selector {
        strata_expr::TemporalSelector::DateRange { start, end } => {
            strata_connectors::TemporalSelector::DateRange(strata_connectors::DateRange { start: *start, end: *end })
        }
        strata_expr::TemporalSelector::Snapshot(at) => strata_connectors::TemporalSelector::Snapshot(*at),
    }
}

/// True when every row the connector hands back is guaranteed to already
/// satisfy `expr`, so the physical plan doesn't need a residual filter for
/// it on top of the scan (§8.1). Piggybacks on `translate_expr`'s notion of
/// what's representable, plus two things that alone doesn't capture:
/// whether the connector advertises pushdown/compound pushdown at all, and
/// `LIKE`, which every connector in this codebase treats as untranslatable
/// even though it fits the DNF shape `translate_expr` accepts.
fn is_fully_pushed(expr: &Expr, schema: &Schema, caps: &Capabilities) -> bool {
    if !caps.predicate_pushdown {
        return false;
    }
    let Some(dnf) = translate_expr(expr, schema) else { return false };
    if dnf_contains_like(&dnf) {
        return false;
    }
    !matches!(dnf, DnfPredicate::And(_) | DnfPredicate::Or(_)) || caps.can_push_compound_predicates
}

fn dnf_contains_like(predicate: &DnfPredicate) -> bool {
    match predicate {
        DnfPredicate::Comparison(c) => matches!(c.op, DnfOp::Like | DnfOp::NotLike),
        DnfPredicate::And(parts) | DnfPredicate::Or(parts) => parts.iter().any(dnf_contains_like),
    }
}

/// Best-effort translation to the connector's restricted DNF shape (§4.7):
/// single `(column, op, literal)` comparisons ANDed/ORed together. Anything
/// outside that shape is simply omitted — the physical filter above the
/// scan still applies the original expression in full.
fn translate_conjuncts(filters: &[Expr], schema: &Schema) -> Option<DnfPredicate> {
    let translated: Vec<DnfPredicate> = filters.iter().filter_map(|f| translate_expr(f, schema)).collect();
    match translated.len() {
        0 => None,
        1 => Some(translated.into_iter().next().unwrap()),
        _ => Some(DnfPredicate::And(translated)),
    }
}

fn translate_expr(expr: &Expr, schema: &Schema) -> Option<DnfPredicate> {
    match expr {
        Expr::And(parts) => {
            let all: Option<Vec<DnfPredicate>> = parts.iter().map(|p| translate_expr(p, schema)).collect();
            all.map(DnfPredicate::And)
        }
        Expr::Or(parts) => {
            let all: Option<Vec<DnfPredicate>> = parts.iter().map(|p| translate_expr(p, schema)).collect();
            all.map(DnfPredicate::Or)
        }
        Expr::Compare(op, l, r) => {
            let (Expr::Column(c), Expr::Literal(v, _)) = (l.as_ref(), r.as_ref()) else { return None };
            let dnf_op = match op {
                ComparisonOp::Eq => DnfOp::Eq,
                ComparisonOp::NotEq => DnfOp::NotEq,
                ComparisonOp::Lt => DnfOp::Lt,
                ComparisonOp::LtEq => DnfOp::LtEq,
                ComparisonOp::Gt => DnfOp::Gt,
                ComparisonOp::GtEq => DnfOp::GtEq,
                ComparisonOp::Is | ComparisonOp::IsNot => return None,
            };
            Some(DnfPredicate::Comparison(DnfComparison {
                column: schema.field(c.index).name.clone(),
                op: dnf_op,
                value: Some(v.clone()),
                values: Vec::new(),
            }))
        }
        Expr::InList(inner, list, negated) => {
            let Expr::Column(c) = inner.as_ref() else { return None };
            let values = list
                .iter()
                .map(|v| match v {
                    Expr::Literal(v, _) => Some(v.clone()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(DnfPredicate::Comparison(DnfComparison {
                column: schema.field(c.index).name.clone(),
                op: if *negated { DnfOp::NotIn } else { DnfOp::In },
                value: None,
                values,
            }))
        }
        Expr::IsNull(inner, negated) => {
            let Expr::Column(c) = inner.as_ref() else { return None };
            Some(DnfPredicate::Comparison(DnfComparison {
                column: schema.field(c.index).name.clone(),
                op: if *negated { DnfOp::IsNotNull } else { DnfOp::IsNull },
                value: None,
                values: Vec::new(),
            }))
        }
        Expr::Like(inner, pattern, case_insensitive, negated) if !case_insensitive => {
            let (Expr::Column(c), Expr::Literal(v, _)) = (inner.as_ref(), pattern.as_ref()) else { return None };
            Some(DnfPredicate::Comparison(DnfComparison {
                column: schema.field(c.index).name.clone(),
                op: if *negated { DnfOp::NotLike } else { DnfOp::Like },
                value: Some(v.clone()),
                values: Vec::new(),
            }))
        }
        _ => None,
    }
}

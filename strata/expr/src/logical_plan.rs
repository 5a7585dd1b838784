//! Logical operators: the immutable DAG nodes the binder produces and the
//! optimizer rewrites. Each node's output schema is a pure function of its
//! inputs' schemas and parameters (invariant 1 in §3.2).

use crate::expr::Expr;
use std::collections::HashSet;
use strata_common::{RelationStatistics, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    LeftSemi,
    LeftAnti,
}

/// Plan-level hints a `Scan`/`Project` may carry. Stored as a set of string
/// tags (`NO_PUSH_PROJECTION`, `NO_CACHE`) matching spec.md's wording
/// literally, rather than a bespoke bitflag enum per hint.
pub type Hints = HashSet<String>;

pub const HINT_NO_PUSH_PROJECTION: &str = "NO_PUSH_PROJECTION";
pub const HINT_NO_CACHE: &str = "NO_CACHE";

#[derive(Debug, Clone)]
pub struct AggregateExpr {
    pub function: String,
    /// `None` only for `COUNT(*)`.
    pub arg: Option<Expr>,
    pub distinct: bool,
    /// `ARRAY_AGG(... LIMIT n)`.
    pub limit: Option<usize>,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct SortExpr {
    pub expr: Expr,
    pub direction: SortDirection,
    pub nulls_first: bool,
}

/// A point-in-time or date-range selector resolved from a `FOR` clause.
/// Mirrors `strata_connectors::TemporalSelector` rather than depending on
/// it directly — the logical-plan layer sits below the connector layer in
/// the dependency graph, so the physical planner (which depends on both)
/// is where this gets translated into the connector-facing type.
#[derive(Debug, Clone, PartialEq)]
pub enum TemporalSelector {
    DateRange { start: chrono::NaiveDate, end: chrono::NaiveDate },
    Snapshot(chrono::DateTime<chrono::Utc>),
}

/// A resolved dataset reference: the connector key the binder's longest-
/// prefix match chose, and the inner name handed to that connector.
#[derive(Debug, Clone)]
pub struct DatasetRef {
    pub connector_key: String,
    pub inner_name: String,
    pub alias: String,
    /// The selector resolved from a `FOR` clause on this dataset, if any;
    /// carried here rather than on the query as a whole since a join may
    /// reference multiple datasets each with its own `FOR` clause.
    pub temporal: Option<TemporalSelector>,
}

#[derive(Debug, Clone)]
pub enum LogicalPlan {
    Scan {
        dataset: DatasetRef,
        schema: Schema,
        statistics: RelationStatistics,
        projection: Option<Vec<usize>>,
        filters: Vec<Expr>,
        limit: Option<usize>,
        hints: Hints,
    },
    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },
    Project {
        input: Box<LogicalPlan>,
        exprs: Vec<Expr>,
        schema: Schema,
        hints: Hints,
    },
    Aggregate {
        input: Box<LogicalPlan>,
        group_by: Vec<Expr>,
        aggregates: Vec<AggregateExpr>,
        schema: Schema,
    },
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        join_type: JoinType,
        /// Equi-join key pairs `(left_key, right_key)`.
        on: Vec<(Expr, Expr)>,
        /// Residual non-equi predicate, if any (forces `NestedLoopJoin`).
        filter: Option<Expr>,
        schema: Schema,
    },
    CrossJoin {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        schema: Schema,
    },
    Sort {
        input: Box<LogicalPlan>,
        exprs: Vec<SortExpr>,
    },
    Limit {
        input: Box<LogicalPlan>,
        limit: Option<usize>,
        offset: usize,
    },
    Distinct {
        input: Box<LogicalPlan>,
    },
    Union {
        inputs: Vec<LogicalPlan>,
        schema: Schema,
    },
    Unnest {
        input: Box<LogicalPlan>,
        expr: Expr,
        alias: String,
        schema: Schema,
    },
    Values {
        rows: Vec<Vec<Expr>>,
        schema: Schema,
    },
}

impl LogicalPlan {
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::Scan { .. } | LogicalPlan::Values { .. } => vec![],
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Distinct { input }
            | LogicalPlan::Unnest { input, .. } => vec![input.as_ref()],
            LogicalPlan::Join { left, right, .. } | LogicalPlan::CrossJoin { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            LogicalPlan::Union { inputs, .. } => inputs.iter().collect(),
        }
    }

    /// The output schema, derived from this node's children and parameters.
    pub fn schema(&self) -> Schema {
        match self {
            LogicalPlan::Scan { schema, projection, .. } => match projection {
                Some(p) => schema.project(p),
                None => schema.clone(),
            },
            LogicalPlan::Filter { input, .. } => input.schema(),
            LogicalPlan::Project { schema, .. } => schema.clone(),
            LogicalPlan::Aggregate { schema, .. } => schema.clone(),
            LogicalPlan::Join { schema, .. } => schema.clone(),
            LogicalPlan::CrossJoin { schema, .. } => schema.clone(),
            LogicalPlan::Sort { input, .. } => input.schema(),
            LogicalPlan::Limit { input, .. } => input.schema(),
            LogicalPlan::Distinct { input } => input.schema(),
            LogicalPlan::Union { schema, .. } => schema.clone(),
            LogicalPlan::Unnest { schema, .. } => schema.clone(),
            LogicalPlan::Values { schema, .. } => schema.clone(),
        }
    }

    /// True for pipeline breakers (invariant 3): `HashAggregate`, build side
    /// of `HashJoin`, `HeapSort`, `Distinct`.
    pub fn is_pipeline_breaker(&self) -> bool {
        matches!(
            self,
            LogicalPlan::Aggregate { .. } | LogicalPlan::Sort { .. } | LogicalPlan::Distinct { .. }
        )
    }

    /// Rebuilds this node with `children` standing in for the current
    /// children, in the same order `children()` returned them. Lets the
    /// optimizer rewrite a plan generically (recurse, rewrite each child,
    /// reassemble) without a match arm per rule per node shape.
    pub fn with_new_children(&self, mut children: Vec<LogicalPlan>) -> LogicalPlan {
        match self {
            LogicalPlan::Scan { .. } | LogicalPlan::Values { .. } => {
                debug_assert!(children.is_empty());
                self.clone()
            }
            LogicalPlan::Filter { predicate, .. } => {
                LogicalPlan::Filter { input: Box::new(children.remove(0)), predicate: predicate.clone() }
            }
            LogicalPlan::Project { exprs, schema, hints, .. } => LogicalPlan::Project {
                input: Box::new(children.remove(0)),
                exprs: exprs.clone(),
                schema: schema.clone(),
                hints: hints.clone(),
            },
            LogicalPlan::Aggregate { group_by, aggregates, schema, .. } => LogicalPlan::Aggregate {
                input: Box::new(children.remove(0)),
                group_by: group_by.clone(),
                aggregates: aggregates.clone(),
                schema: schema.clone(),
            },
            LogicalPlan::Join { join_type, on, filter, schema, .. } => {
                let right = children.remove(1);
                let left = children.remove(0);
                LogicalPlan::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type: *join_type,
                    on: on.clone(),
                    filter: filter.clone(),
                    schema: schema.clone(),
                }
            }
            LogicalPlan::CrossJoin { schema, .. } => {
                let right = children.remove(1);
                let left = children.remove(0);
                LogicalPlan::CrossJoin { left: Box::new(left), right: Box::new(right), schema: schema.clone() }
            }
            LogicalPlan::Sort { exprs, .. } => LogicalPlan::Sort { input: Box::new(children.remove(0)), exprs: exprs.clone() },
            LogicalPlan::Limit { limit, offset, .. } => {
                LogicalPlan::Limit { input: Box::new(children.remove(0)), limit: *limit, offset: *offset }
            }
            LogicalPlan::Distinct { .. } => LogicalPlan::Distinct { input: Box::new(children.remove(0)) },
            LogicalPlan::Union { schema, .. } => LogicalPlan::Union { inputs: children, schema: schema.clone() },
            LogicalPlan::Unnest { expr, alias, schema, .. } => LogicalPlan::Unnest {
                input: Box::new(children.remove(0)),
                expr: expr.clone(),
                alias: alias.clone(),
                schema: schema.clone(),
            },
        }
    }
}

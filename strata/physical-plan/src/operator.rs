//! The `ExecutionOperator` trait: every physical operator variant in §3.1
//! implements it. Pull-based (`next_batch` is called in a loop by the
//! caller) rather than push-based, per §4.5's scheduling model — the
//! opposite of the teacher's `Stream`-of-batches `ExecutionPlan::execute`,
//! chosen because the spec mandates single-threaded cooperative pull with
//! suspension only at operator boundaries, which a plain async fn models
//! more directly than a `Stream` impl would.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use strata_common::{Result, Schema};

use crate::context::ExecutionContext;

#[async_trait]
pub trait ExecutionOperator: Debug + Send {
    /// The output schema; a pure function of the operator's children and
    /// parameters (invariant 1), computed once at construction.
    fn schema(&self) -> &Arc<Schema>;

    /// Pulls the next batch, or `None` at end of input. Implementations
    /// check `ctx.check_cancelled()` first, per §4.5.
    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<strata_common::Batch>>;

    /// Short operator name for `EXPLAIN` (§6.6).
    fn name(&self) -> &'static str;

    /// Children, for `EXPLAIN` tree rendering. Most operators have exactly
    /// one; `Join`/`CrossJoinUnnest`/`NestedLoopJoin` have two; sources have
    /// none.
    fn children(&self) -> Vec<&PhysicalPlan> {
        Vec::new()
    }

    /// Extra per-operator detail for `EXPLAIN` (§6.6), e.g. the predicate and
    /// projection a scan pushed down to its connector. `None` when an
    /// operator has nothing beyond its name worth rendering, or — for
    /// `ConnectorScan` — once the request has already been consumed by
    /// execution.
    fn detail(&self) -> Option<String> {
        None
    }
}

/// The physical plan is a tree, never a DAG (invariant 5) — shared subplans
/// are re-materialized via an explicit `InMemorySource`. Ownership is
/// therefore single-parent, so a `Box<dyn ..>` (not `Arc`) is the right
/// pointer: no node is ever referenced from two places.
pub type PhysicalPlan = Box<dyn ExecutionOperator>;

/// Drains a plan to completion, e.g. for `Cursor::to_arrow_table()`.
pub async fn collect(plan: &mut PhysicalPlan, ctx: &ExecutionContext) -> Result<Vec<strata_common::Batch>> {
    let mut batches = Vec::new();
    while let Some(batch) = plan.next_batch(ctx).await? {
        batches.push(batch);
    }
    Ok(batches)
}

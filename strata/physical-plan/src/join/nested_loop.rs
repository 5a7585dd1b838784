//! `NestedLoopJoin` (§4.9): cross joins and joins carrying a non-equality
//! predicate degrade to this from `HashJoin` — the build side is still
//! materialized once, but every probe row is compared against every build
//! row rather than via a key lookup.

use arrow::array::{AsArray, UInt32Array};
use async_trait::async_trait;
use std::sync::Arc;
use strata_common::{Batch, Result, Schema};
use strata_physical_expr::PhysicalExprRef;

use crate::context::ExecutionContext;
use crate::join::hash_join::concat_sides;
use crate::operator::{ExecutionOperator, PhysicalPlan};

enum State {
    Building,
    Probing(Batch),
    Done,
}

pub struct NestedLoopJoinOperator {
    build_input: Option<PhysicalPlan>,
    probe_input: PhysicalPlan,
    /// Evaluated over the row-wise cross product of one probe batch against
    /// the whole build side; `None` for a plain cross join.
    predicate: Option<PhysicalExprRef>,
    schema: Arc<Schema>,
    state: State,
}

impl std::fmt::Debug for NestedLoopJoinOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NestedLoopJoinOperator")
    }
}

impl NestedLoopJoinOperator {
    pub fn new(build_input: PhysicalPlan, probe_input: PhysicalPlan, predicate: Option<PhysicalExprRef>, schema: Arc<Schema>) -> Self {
        Self { build_input: Some(build_input), probe_input, predicate, schema, state: State::Building }
    }

    /// Builds the dense row-wise cross product `probe_batch x build_batch`,
    /// then filters with `predicate` if one is present.
    fn cross_product(&self, probe_batch: &Batch, build_batch: &Batch) -> Result<Batch> {
        let probe_rows = probe_batch.num_rows();
        let build_rows = build_batch.num_rows();
        let mut probe_indices = Vec::with_capacity(probe_rows * build_rows);
        let mut build_indices = Vec::with_capacity(probe_rows * build_rows);
        for p in 0..probe_rows {
            for b in 0..build_rows {
                probe_indices.push(p as u32);
                build_indices.push(b as u32);
            }
        }
        let probe_side = probe_batch.take(&UInt32Array::from(probe_indices))?;
        let build_side = build_batch.take(&UInt32Array::from(build_indices))?;
        let combined = concat_sides(&self.schema, probe_side, build_side)?;

        match &self.predicate {
            None => Ok(combined),
            Some(predicate) => {
                let mask = predicate.evaluate(&combined)?.into_array(combined.num_rows())?;
                let mask = mask.as_boolean();
                Ok(combined.filter(mask)?)
            }
        }
    }
}

#[async_trait]
impl ExecutionOperator for NestedLoopJoinOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Building => {
                    let mut build_input = self.build_input.take().expect("build runs exactly once");
                    let schema = build_input.schema().clone();
                    let mut batches = Vec::new();
                    let mut total_rows = 0usize;
                    while let Some(batch) = build_input.next_batch(ctx).await? {
                        total_rows += batch.num_rows();
                        ctx.check_materialize_budget(total_rows)?;
                        batches.push(batch);
                    }
                    self.state = State::Probing(Batch::concat(schema, &batches)?);
                }
                State::Probing(build_batch) => {
                    let Some(probe_batch) = self.probe_input.next_batch(ctx).await? else {
                        self.state = State::Done;
                        return Ok(None);
                    };
                    let output = self.cross_product(&probe_batch, &build_batch)?;
                    self.state = State::Probing(build_batch);
                    if output.num_rows() == 0 {
                        continue;
                    }
                    return Ok(Some(output));
                }
                State::Done => return Ok(None),
            }
        }
    }

    fn name(&self) -> &'static str {
        "NestedLoopJoin"
    }
}

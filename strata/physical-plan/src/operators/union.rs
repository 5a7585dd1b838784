//! `UnionAll` (§3.1): concatenates N inputs of identical schema, streaming
//! each to completion in order before moving to the next.

use async_trait::async_trait;
use std::sync::Arc;
use strata_common::{Batch, Result, Schema};

use crate::context::ExecutionContext;
use crate::operator::{ExecutionOperator, PhysicalPlan};

pub struct UnionAllOperator {
    inputs: Vec<PhysicalPlan>,
    current: usize,
    schema: Arc<Schema>,
}

impl UnionAllOperator {
    pub fn new(inputs: Vec<PhysicalPlan>, schema: Arc<Schema>) -> Self {
        Self { inputs, current: 0, schema }
    }
}

impl std::fmt::Debug for UnionAllOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnionAllOperator({} inputs)", self.inputs.len())
    }
}

#[async_trait]
impl ExecutionOperator for UnionAllOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        while self.current < self.inputs.len() {
            match self.inputs[self.current].next_batch(ctx).await? {
                Some(batch) => return Ok(Some(batch)),
                None => self.current += 1,
            }
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "UnionAll"
    }

    fn children(&self) -> Vec<&PhysicalPlan> {
        self.inputs.iter().collect()
    }
}

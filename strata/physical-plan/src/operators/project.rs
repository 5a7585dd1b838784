//! `VectorProject` (§3.1): evaluates a list of compiled expressions per
//! batch and assembles the results into the output schema's columns.

use async_trait::async_trait;
use std::sync::Arc;
use strata_common::{Batch, Result, Schema};
use strata_physical_expr::PhysicalExprRef;

use crate::context::ExecutionContext;
use crate::operator::{ExecutionOperator, PhysicalPlan};

pub struct VectorProjectOperator {
    input: PhysicalPlan,
    exprs: Vec<PhysicalExprRef>,
    schema: Arc<Schema>,
}

impl VectorProjectOperator {
    pub fn new(input: PhysicalPlan, exprs: Vec<PhysicalExprRef>, schema: Arc<Schema>) -> Self {
        Self { input, exprs, schema }
    }
}

impl std::fmt::Debug for VectorProjectOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VectorProjectOperator")
    }
}

#[async_trait]
impl ExecutionOperator for VectorProjectOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        let Some(batch) = self.input.next_batch(ctx).await? else { return Ok(None) };
        let num_rows = batch.num_rows();
        let columns = self
            .exprs
            .iter()
            .map(|e| e.evaluate(&batch)?.into_array(num_rows))
            .collect::<Result<Vec<_>>>()?;
        let arrow_schema = Arc::new(self.schema.to_arrow());
        let data = arrow::record_batch::RecordBatch::try_new(arrow_schema, columns)?;
        Ok(Some(Batch::new(self.schema.clone(), data)))
    }

    fn name(&self) -> &'static str {
        "VectorProject"
    }

    fn children(&self) -> Vec<&PhysicalPlan> {
        vec![&self.input]
    }
}

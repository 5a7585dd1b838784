//! `CrossJoinUnnest` (§3.1): expands an `ARRAY`-typed column into one row
//! per element, duplicating every other column of the source row. A row
//! whose array is null or empty contributes no output rows — the cross
//! join against an empty set is empty.

use arrow::array::{Array, AsArray, UInt32Array};
use arrow::compute::concat;
use async_trait::async_trait;
use std::sync::Arc;
use strata_common::{Batch, Result, Schema};

use crate::context::ExecutionContext;
use crate::operator::{ExecutionOperator, PhysicalPlan};

pub struct CrossJoinUnnestOperator {
    input: PhysicalPlan,
    column: usize,
    schema: Arc<Schema>,
}

impl CrossJoinUnnestOperator {
    pub fn new(input: PhysicalPlan, column: usize, schema: Arc<Schema>) -> Self {
        Self { input, column, schema }
    }
}

impl std::fmt::Debug for CrossJoinUnnestOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CrossJoinUnnestOperator(col={})", self.column)
    }
}

#[async_trait]
impl ExecutionOperator for CrossJoinUnnestOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        loop {
            let Some(batch) = self.input.next_batch(ctx).await? else { return Ok(None) };
            let list = batch.column(self.column).as_list::<i32>();

            let mut outer_indices = Vec::new();
            let mut value_arrays: Vec<arrow::array::ArrayRef> = Vec::new();
            for row in 0..batch.num_rows() {
                if list.is_null(row) {
                    continue;
                }
                let values = list.value(row);
                for _ in 0..values.len() {
                    outer_indices.push(row as u32);
                }
                value_arrays.push(values);
            }
            if outer_indices.is_empty() {
                continue;
            }

            let outer = batch.take(&UInt32Array::from(outer_indices))?;
            let refs: Vec<&dyn Array> = value_arrays.iter().map(|a| a.as_ref()).collect();
            let flattened = concat(&refs)?;

            let arrow_schema = Arc::new(self.schema.to_arrow());
            let mut columns: Vec<_> = (0..outer.num_columns()).map(|i| outer.column(i).clone()).collect();
            columns.push(flattened);
            let data = arrow::record_batch::RecordBatch::try_new(arrow_schema, columns)?;
            return Ok(Some(Batch::new(self.schema.clone(), data)));
        }
    }

    fn name(&self) -> &'static str {
        "CrossJoinUnnest"
    }

    fn children(&self) -> Vec<&PhysicalPlan> {
        vec![&self.input]
    }
}

//! `Limit` (§3.1): skips `offset` rows then passes through at most `limit`,
//! streaming — no buffering beyond the current batch.

use arrow::array::UInt32Array;
use async_trait::async_trait;
use std::sync::Arc;
use strata_common::{Batch, Result, Schema};

use crate::context::ExecutionContext;
use crate::operator::{ExecutionOperator, PhysicalPlan};

pub struct LimitOperator {
    input: PhysicalPlan,
    limit: Option<usize>,
    remaining_offset: usize,
    remaining_limit: Option<usize>,
    done: bool,
}

impl LimitOperator {
    pub fn new(input: PhysicalPlan, limit: Option<usize>, offset: usize) -> Self {
        Self { input, limit, remaining_offset: offset, remaining_limit: limit, done: false }
    }
}

impl std::fmt::Debug for LimitOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LimitOperator(limit={:?})", self.limit)
    }
}

#[async_trait]
impl ExecutionOperator for LimitOperator {
    fn schema(&self) -> &Arc<Schema> {
        self.input.schema()
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        if self.done || self.remaining_limit == Some(0) {
            return Ok(None);
        }
        loop {
            let Some(batch) = self.input.next_batch(ctx).await? else { return Ok(None) };
            let rows = batch.num_rows();
            if self.remaining_offset >= rows {
                self.remaining_offset -= rows;
                continue;
            }
            let start = self.remaining_offset;
            self.remaining_offset = 0;
            let available = rows - start;
            let take = self.remaining_limit.map_or(available, |l| l.min(available));
            if take == 0 {
                self.done = true;
                return Ok(None);
            }
            if let Some(remaining) = &mut self.remaining_limit {
                *remaining -= take;
                if *remaining == 0 {
                    self.done = true;
                }
            }
            let indices = UInt32Array::from((start as u32..(start + take) as u32).collect::<Vec<_>>());
            return Ok(Some(batch.take(&indices)?));
        }
    }

    fn name(&self) -> &'static str {
        "Limit"
    }

    fn children(&self) -> Vec<&PhysicalPlan> {
        vec![&self.input]
    }
}

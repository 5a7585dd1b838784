//! `HeapSort(k)` (§3.1, §4.4): a plain `Sort` compiles with `k = None`; when
//! the optimizer fuses a `Sort` with a following `Limit`, `k` becomes the
//! fused row count and only the best `k` rows survive the final sort. Like
//! `HashAggregate`/`HashJoin`, the whole input is buffered first (invariant
//! 4) — the `k` bound trims the buffer down at the very end rather than
//! keeping memory use below it while streaming.

use arrow::array::UInt32Array;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use strata_common::{Batch, Result, ScalarValue, Schema};
use strata_physical_expr::PhysicalExprRef;

use crate::aggregate::accumulator::scalar_at;
use crate::context::ExecutionContext;
use crate::operator::{ExecutionOperator, PhysicalPlan};

#[derive(Clone)]
pub struct SortKey {
    pub expr: PhysicalExprRef,
    pub ascending: bool,
    pub nulls_first: bool,
}

/// Orders two key tuples by `specs`; the tuple that compares `Less` is the
/// one that should be emitted first.
fn compare_keys(a: &[ScalarValue], b: &[ScalarValue], specs: &[SortKey]) -> Ordering {
    for (idx, spec) in specs.iter().enumerate() {
        let (av, bv) = (&a[idx], &b[idx]);
        let ordering = match (av.is_null(), bv.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => if spec.nulls_first { Ordering::Less } else { Ordering::Greater },
            (false, true) => if spec.nulls_first { Ordering::Greater } else { Ordering::Less },
            (false, false) => {
                let cmp = av.try_cmp(bv).unwrap_or(Ordering::Equal);
                if spec.ascending { cmp } else { cmp.reverse() }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

struct Entry {
    keys: Vec<ScalarValue>,
    row: Batch,
}

enum State {
    Buffering,
    Emitting(std::vec::IntoIter<Batch>),
    Done,
}

pub struct HeapSortOperator {
    input: PhysicalPlan,
    keys: Vec<SortKey>,
    k: Option<usize>,
    schema: Arc<Schema>,
    morsel_rows: usize,
    state: State,
}

impl HeapSortOperator {
    pub fn new(input: PhysicalPlan, keys: Vec<SortKey>, k: Option<usize>, schema: Arc<Schema>) -> Self {
        Self { input, keys, k, schema, morsel_rows: strata_common::DEFAULT_MORSEL_ROWS, state: State::Buffering }
    }

    async fn buffer_and_sort(&mut self, ctx: &ExecutionContext) -> Result<Vec<Batch>> {
        let mut entries: Vec<Entry> = Vec::new();
        let mut buffered_rows = 0usize;

        while let Some(batch) = self.input.next_batch(ctx).await? {
            buffered_rows += batch.num_rows();
            ctx.check_materialize_budget(buffered_rows)?;

            let key_columns = self
                .keys
                .iter()
                .map(|spec| spec.expr.evaluate(&batch)?.into_array(batch.num_rows()))
                .collect::<Result<Vec<_>>>()?;

            for row in 0..batch.num_rows() {
                let keys = key_columns.iter().map(|c| scalar_at(c, row)).collect::<Result<Vec<_>>>()?;
                let one_row = batch.take(&UInt32Array::from(vec![row as u32]))?;
                entries.push(Entry { keys, row: one_row });
            }
        }

        entries.sort_by(|a, b| compare_keys(&a.keys, &b.keys, &self.keys));
        if let Some(k) = self.k {
            entries.truncate(k);
        }

        if entries.is_empty() {
            let arrow_schema = Arc::new(self.schema.to_arrow());
            return Ok(vec![Batch::new(self.schema.clone(), arrow::record_batch::RecordBatch::new_empty(arrow_schema))]);
        }

        let rows: Vec<Batch> = entries.into_iter().map(|e| e.row).collect();
        let mut batches = Vec::new();
        for chunk in rows.chunks(self.morsel_rows.max(1)) {
            batches.push(Batch::concat(self.schema.clone(), chunk)?);
        }
        Ok(batches)
    }
}

impl std::fmt::Debug for HeapSortOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HeapSortOperator(k={:?})", self.k)
    }
}

#[async_trait]
impl ExecutionOperator for HeapSortOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        loop {
            match &mut self.state {
                State::Buffering => {
                    let batches = self.buffer_and_sort(ctx).await?;
                    self.state = State::Emitting(batches.into_iter());
                }
                State::Emitting(iter) => match iter.next() {
                    Some(batch) => return Ok(Some(batch)),
                    None => {
                        self.state = State::Done;
                        return Ok(None);
                    }
                },
                State::Done => return Ok(None),
            }
        }
    }

    fn name(&self) -> &'static str {
        "HeapSort"
    }

    fn children(&self) -> Vec<&PhysicalPlan> {
        vec![&self.input]
    }
}

//! `Batch` (morsel): the unit of data flow between operators. A contiguous,
//! immutable tabular chunk of up to `MORSEL_ROWS` rows, produced by a source
//! and consumed at most once downstream.

use crate::schema::Schema;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Batch {
    schema: Arc<Schema>,
    data: RecordBatch,
}

impl Batch {
    pub fn new(schema: Arc<Schema>, data: RecordBatch) -> Self {
        debug_assert_eq!(schema.len(), data.num_columns());
        Self { schema, data }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn record_batch(&self) -> &RecordBatch {
        &self.data
    }

    pub fn num_rows(&self) -> usize {
        self.data.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.data.num_columns()
    }

    pub fn column(&self, idx: usize) -> &arrow::array::ArrayRef {
        self.data.column(idx)
    }

    /// Projects this batch down to the given column indices, preserving order.
    pub fn project(&self, indices: &[usize]) -> crate::Result<Batch> {
        let columns = indices
            .iter()
            .map(|&i| self.data.column(i).clone())
            .collect::<Vec<_>>();
        let projected_schema = self.schema.project(indices);
        let arrow_schema = Arc::new(projected_schema.to_arrow());
        let data = RecordBatch::try_new(arrow_schema, columns)?;
        Ok(Batch::new(Arc::new(projected_schema), data))
    }

    /// Filters rows using a boolean mask, used by `VectorFilter`/`HashFilter`.
    pub fn filter(&self, mask: &arrow::array::BooleanArray) -> crate::Result<Batch> {
        let data = arrow::compute::filter_record_batch(&self.data, mask)?;
        Ok(Batch::new(self.schema.clone(), data))
    }

    /// Takes rows by index, used by join probe/build matching and sort.
    pub fn take(&self, indices: &arrow::array::UInt32Array) -> crate::Result<Batch> {
        let columns = self
            .data
            .columns()
            .iter()
            .map(|c| arrow::compute::take(c.as_ref(), indices, None))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let data = RecordBatch::try_new(self.data.schema(), columns)?;
        Ok(Batch::new(self.schema.clone(), data))
    }

    /// Row-count-preserving concatenation of same-schema batches, used by
    /// pipeline breakers that materialize a build/buffer side.
    pub fn concat(schema: Arc<Schema>, batches: &[Batch]) -> crate::Result<Batch> {
        if batches.is_empty() {
            let arrow_schema = Arc::new(schema.to_arrow());
            return Ok(Batch::new(schema, RecordBatch::new_empty(arrow_schema)));
        }
        let arrow_batches: Vec<&RecordBatch> = batches.iter().map(|b| &b.data).collect();
        let data = arrow::compute::concat_batches(&arrow_batches[0].schema(), arrow_batches)?;
        Ok(Batch::new(schema, data))
    }
}

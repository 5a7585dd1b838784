use strata_common::{Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::PhysicalExpr;

/// A bound column reference. The binder has already resolved `source`/
/// `index`; at this layer a `Batch` is the already-joined input row, so only
/// `index` into its columns is needed.
#[derive(Debug)]
pub struct ColumnExpr {
    index: usize,
    logical_type: LogicalType,
}

impl ColumnExpr {
    pub fn new(index: usize, logical_type: LogicalType) -> Self {
        Self { index, logical_type }
    }
}

impl PhysicalExpr for ColumnExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        Ok(ColumnarValue::Array(batch.column(self.index).clone()))
    }

    fn logical_type(&self) -> LogicalType {
        self.logical_type.clone()
    }
}

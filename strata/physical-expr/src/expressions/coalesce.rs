use arrow::compute::kernels::zip::zip;
use strata_common::{Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// `COALESCE(a, b, c, ...)`: the first non-null argument per row. `IFNULL`/
/// `IFNOTNULL` (§4.6) are two-argument special cases compiled to this same
/// node by `compile.rs`.
#[derive(Debug)]
pub struct CoalesceExpr {
    args: Vec<PhysicalExprRef>,
    logical_type: LogicalType,
}

impl CoalesceExpr {
    pub fn new(args: Vec<PhysicalExprRef>, logical_type: LogicalType) -> Self {
        Self { args, logical_type }
    }
}

impl PhysicalExpr for CoalesceExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let num_rows = batch.num_rows();
        let mut iter = self.args.iter();
        let Some(first) = iter.next() else {
            return Ok(ColumnarValue::Array(arrow::array::new_null_array(
                &self.logical_type.to_arrow(),
                num_rows,
            )));
        };
        let mut acc = first.evaluate(batch)?.into_array(num_rows)?;
        for arg in iter {
            let candidate = arg.evaluate(batch)?.into_array(num_rows)?;
            let is_acc_null = arrow::compute::is_null(&acc)?;
            acc = zip(&is_acc_null, &candidate, &acc)?;
        }
        Ok(ColumnarValue::Array(acc))
    }

    fn logical_type(&self) -> LogicalType {
        self.logical_type.clone()
    }
}

use arrow::compute::kernels::cmp::{eq, gt, gt_eq, lt, lt_eq, neq};
use std::sync::Arc;
use strata_common::{Batch, LogicalType, Result};
use strata_expr::ComparisonOp;

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// `Eq`/`NotEq`/ordering comparisons use arrow's null-propagating `cmp`
/// kernels; `Is`/`IsNot` use the null-aware `is_distinct_from` family so
/// `NULL IS NULL` is `TRUE` rather than unknown (§4.6's one exception to
/// "null input yields null output").
#[derive(Debug)]
pub struct CompareExpr {
    op: ComparisonOp,
    left: PhysicalExprRef,
    right: PhysicalExprRef,
}

impl CompareExpr {
    pub fn new(op: ComparisonOp, left: PhysicalExprRef, right: PhysicalExprRef) -> Self {
        Self { op, left, right }
    }
}

impl PhysicalExpr for CompareExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let left = self.left.evaluate(batch)?.as_array_ref()?;
        let right = self.right.evaluate(batch)?.as_array_ref()?;
        let result = match self.op {
            ComparisonOp::Eq => eq(&left, &right)?,
            ComparisonOp::NotEq => neq(&left, &right)?,
            ComparisonOp::Lt => lt(&left, &right)?,
            ComparisonOp::LtEq => lt_eq(&left, &right)?,
            ComparisonOp::Gt => gt(&left, &right)?,
            ComparisonOp::GtEq => gt_eq(&left, &right)?,
            ComparisonOp::Is => {
                arrow::compute::kernels::boolean::is_not_distinct_from(&left, &right)?
            }
            ComparisonOp::IsNot => arrow::compute::kernels::boolean::is_distinct_from(&left, &right)?,
        };
        Ok(ColumnarValue::Array(Arc::new(result)))
    }

    fn logical_type(&self) -> LogicalType {
        LogicalType::Boolean
    }
}

use arrow::compute::kernels::boolean::and_kleene;
use arrow::compute::kernels::cmp::{gt_eq, lt_eq};
use std::sync::Arc;
use strata_common::{Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// `x BETWEEN lo AND hi`, compiled as `x >= lo AND x <= hi` rather than its
/// own arrow kernel — there is no dedicated three-way-compare kernel, and
/// this reuses the existing null-aware comparison/AND building blocks.
#[derive(Debug)]
pub struct BetweenExpr {
    value: PhysicalExprRef,
    low: PhysicalExprRef,
    high: PhysicalExprRef,
}

impl BetweenExpr {
    pub fn new(value: PhysicalExprRef, low: PhysicalExprRef, high: PhysicalExprRef) -> Self {
        Self { value, low, high }
    }
}

impl PhysicalExpr for BetweenExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let value = self.value.evaluate(batch)?.as_array_ref()?;
        let low = self.low.evaluate(batch)?.as_array_ref()?;
        let high = self.high.evaluate(batch)?.as_array_ref()?;
        let above_low = gt_eq(&value, &low)?;
        let below_high = lt_eq(&value, &high)?;
        Ok(ColumnarValue::Array(Arc::new(and_kleene(&above_low, &below_high)?)))
    }

    fn logical_type(&self) -> LogicalType {
        LogicalType::Boolean
    }
}

use std::sync::Arc;
use strata_common::{Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// `IS NULL` / `IS NOT NULL` — one of the explicit exceptions in §4.6 to
/// "a null input yields null": this node never produces a null output.
#[derive(Debug)]
pub struct IsNullExpr {
    input: PhysicalExprRef,
    negated: bool,
}

impl IsNullExpr {
    pub fn new(input: PhysicalExprRef, negated: bool) -> Self {
        Self { input, negated }
    }
}

impl PhysicalExpr for IsNullExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let value = self.input.evaluate(batch)?;
        let array = value.into_array(batch.num_rows())?;
        let result = if self.negated {
            arrow::compute::is_not_null(&array)?
        } else {
            arrow::compute::is_null(&array)?
        };
        Ok(ColumnarValue::Array(Arc::new(result)))
    }

    fn logical_type(&self) -> LogicalType {
        LogicalType::Boolean
    }
}

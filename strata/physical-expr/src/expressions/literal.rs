use strata_common::{Batch, LogicalType, Result, ScalarValue};

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::PhysicalExpr;

#[derive(Debug)]
pub struct LiteralExpr {
    value: ScalarValue,
    logical_type: LogicalType,
}

impl LiteralExpr {
    pub fn new(value: ScalarValue, logical_type: LogicalType) -> Self {
        Self { value, logical_type }
    }
}

impl PhysicalExpr for LiteralExpr {
    fn evaluate(&self, _batch: &Batch) -> Result<ColumnarValue> {
        Ok(ColumnarValue::Scalar(self.value.clone()))
    }

    fn logical_type(&self) -> LogicalType {
        self.logical_type.clone()
    }

    fn nullable(&self) -> bool {
        self.value.is_null()
    }
}

use strata_common::{Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::convert::cast_array;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// The binder has already decided a cast is required (§4.6: "the expression
/// engine never guesses types at runtime"); this just runs arrow's cast
/// kernel, which already implements the numeric-widening and temporal
/// conversions the logical type system allows.
#[derive(Debug)]
pub struct CastExpr {
    input: PhysicalExprRef,
    to: LogicalType,
}

impl CastExpr {
    pub fn new(input: PhysicalExprRef, to: LogicalType) -> Self {
        Self { input, to }
    }
}

impl PhysicalExpr for CastExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        match self.input.evaluate(batch)? {
            ColumnarValue::Array(array) => Ok(ColumnarValue::Array(cast_array(&array, &self.to.to_arrow())?)),
            ColumnarValue::Scalar(value) => {
                let array = cast_array(&crate::convert::scalar_to_array(&value, 1)?, &self.to.to_arrow())?;
                Ok(ColumnarValue::Array(array))
            }
        }
    }

    fn logical_type(&self) -> LogicalType {
        self.to.clone()
    }

    fn nullable(&self) -> bool {
        self.input.nullable()
    }
}

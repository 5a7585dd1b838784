use strata_common::{Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// A no-op at evaluation time: naming a column is a `Project`-schema concern,
/// not a value transformation. Kept as its own node so the compiled tree
/// shape mirrors the logical one for `EXPLAIN`.
#[derive(Debug)]
pub struct AliasExpr {
    input: PhysicalExprRef,
    #[allow(dead_code)]
    name: String,
}

impl AliasExpr {
    pub fn new(input: PhysicalExprRef, name: String) -> Self {
        Self { input, name }
    }
}

impl PhysicalExpr for AliasExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        self.input.evaluate(batch)
    }

    fn logical_type(&self) -> LogicalType {
        self.input.logical_type()
    }

    fn nullable(&self) -> bool {
        self.input.nullable()
    }
}

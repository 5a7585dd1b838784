use arrow::array::BooleanArray;
use arrow::compute::kernels::boolean::{and_kleene, not as arrow_not, or_kleene};
use strata_common::{internal_error, Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

fn as_boolean(value: ColumnarValue, len: usize) -> Result<BooleanArray> {
    let array = value.into_array(len)?;
    array
        .as_any()
        .downcast_ref::<BooleanArray>()
        .cloned()
        .ok_or_else(|| internal_error("operand to a boolean operator did not evaluate to BOOLEAN"))
}

/// N-ary AND, already flattened by `boolean_rewrite_and_flatten`. Uses arrow's
/// three-valued (Kleene) `AND` kernel so `FALSE AND NULL` is `FALSE`, not
/// `NULL`, matching §4.6's null semantics.
#[derive(Debug)]
pub struct AndExpr {
    operands: Vec<PhysicalExprRef>,
}

impl AndExpr {
    pub fn new(operands: Vec<PhysicalExprRef>) -> Self {
        Self { operands }
    }
}

impl PhysicalExpr for AndExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let mut acc: Option<BooleanArray> = None;
        for operand in &self.operands {
            let value = as_boolean(operand.evaluate(batch)?, batch.num_rows())?;
            acc = Some(match acc {
                Some(prev) => and_kleene(&prev, &value)?,
                None => value,
            });
        }
        let result = acc.unwrap_or_else(|| BooleanArray::from(vec![true; batch.num_rows()]));
        Ok(ColumnarValue::Array(std::sync::Arc::new(result)))
    }

    fn logical_type(&self) -> LogicalType {
        LogicalType::Boolean
    }
}

#[derive(Debug)]
pub struct OrExpr {
    operands: Vec<PhysicalExprRef>,
}

impl OrExpr {
    pub fn new(operands: Vec<PhysicalExprRef>) -> Self {
        Self { operands }
    }
}

impl PhysicalExpr for OrExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let mut acc: Option<BooleanArray> = None;
        for operand in &self.operands {
            let value = as_boolean(operand.evaluate(batch)?, batch.num_rows())?;
            acc = Some(match acc {
                Some(prev) => or_kleene(&prev, &value)?,
                None => value,
            });
        }
        let result = acc.unwrap_or_else(|| BooleanArray::from(vec![false; batch.num_rows()]));
        Ok(ColumnarValue::Array(std::sync::Arc::new(result)))
    }

    fn logical_type(&self) -> LogicalType {
        LogicalType::Boolean
    }
}

#[derive(Debug)]
pub struct NotExpr {
    input: PhysicalExprRef,
}

impl NotExpr {
    pub fn new(input: PhysicalExprRef) -> Self {
        Self { input }
    }
}

impl PhysicalExpr for NotExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let value = as_boolean(self.input.evaluate(batch)?, batch.num_rows())?;
        Ok(ColumnarValue::Array(std::sync::Arc::new(arrow_not(&value)?)))
    }

    fn logical_type(&self) -> LogicalType {
        LogicalType::Boolean
    }
}

use arrow::array::AsArray;
use strata_common::{internal_error, Batch, LogicalType, Result};
use strata_expr::SubscriptMode;

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// `x['k']` / `x->'k'` / `x->>'k'` on a `STRUCT` column. The key is always a
/// literal by the time it reaches this node — the binder rejects a
/// column-valued key.
#[derive(Debug)]
pub struct SubscriptExpr {
    input: PhysicalExprRef,
    key: String,
    mode: SubscriptMode,
    logical_type: LogicalType,
}

impl SubscriptExpr {
    pub fn new(input: PhysicalExprRef, key: String, mode: SubscriptMode, logical_type: LogicalType) -> Self {
        Self { input, key, mode, logical_type }
    }
}

impl PhysicalExpr for SubscriptExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let input = self.input.evaluate(batch)?.into_array(batch.num_rows())?;
        let member = member_array(&input, &self.key)?;
        match self.mode {
            SubscriptMode::GetMember => Ok(ColumnarValue::Array(member)),
            SubscriptMode::GetMemberAsString => {
                let casted = arrow::compute::cast(&member, &arrow_schema::DataType::Utf8)?;
                Ok(ColumnarValue::Array(casted))
            }
        }
    }

    fn logical_type(&self) -> LogicalType {
        match self.mode {
            SubscriptMode::GetMemberAsString => LogicalType::Varchar,
            SubscriptMode::GetMember => self.logical_type.clone(),
        }
    }
}

fn member_array(input: &arrow::array::ArrayRef, key: &str) -> Result<arrow::array::ArrayRef> {
    let array = input
        .as_struct_opt()
        .ok_or_else(|| internal_error("subscript base expression is not STRUCT"))?;
    array
        .column_by_name(key)
        .cloned()
        .ok_or_else(|| internal_error(format!("struct has no field named {key}")))
}

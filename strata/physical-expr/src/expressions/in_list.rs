use arrow::array::BooleanArray;
use arrow::compute::kernels::boolean::{not, or_kleene};
use arrow::compute::kernels::cmp::eq;
use std::sync::Arc;
use strata_common::{Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// `x IN (a, b, c)` / `x NOT IN (a, b, c)`, compiled as an OR-chain of
/// equality comparisons — the list is a handful of literals in practice, so
/// a dedicated hash-set kernel buys little over reusing `eq`/`or_kleene`.
#[derive(Debug)]
pub struct InListExpr {
    value: PhysicalExprRef,
    list: Vec<PhysicalExprRef>,
    negated: bool,
}

impl InListExpr {
    pub fn new(value: PhysicalExprRef, list: Vec<PhysicalExprRef>, negated: bool) -> Self {
        Self { value, list, negated }
    }
}

impl PhysicalExpr for InListExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let value = self.value.evaluate(batch)?.as_array_ref()?;
        let mut acc: Option<BooleanArray> = None;
        for item in &self.list {
            let item = item.evaluate(batch)?.as_array_ref()?;
            let matched = eq(&value, &item)?;
            acc = Some(match acc {
                Some(prev) => or_kleene(&prev, &matched)?,
                None => matched,
            });
        }
        let membership = acc.unwrap_or_else(|| BooleanArray::from(vec![false; batch.num_rows()]));
        let result = if self.negated { not(&membership)? } else { membership };
        Ok(ColumnarValue::Array(Arc::new(result)))
    }

    fn logical_type(&self) -> LogicalType {
        LogicalType::Boolean
    }
}

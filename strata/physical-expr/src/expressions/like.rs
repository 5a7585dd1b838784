use arrow::compute::{like, nlike};
use std::sync::Arc;
use strata_common::{Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// `LIKE` / `NOT LIKE`, case-sensitive; `predicate_rewriter_*` upstream may
/// have already rewritten `STARTS_WITH`/`ENDS_WITH`/substring-only patterns
/// into this node or past it entirely — this is the literal fallback.
#[derive(Debug)]
pub struct LikeExpr {
    input: PhysicalExprRef,
    pattern: PhysicalExprRef,
    negated: bool,
    case_insensitive: bool,
}

impl LikeExpr {
    pub fn new(input: PhysicalExprRef, pattern: PhysicalExprRef, negated: bool, case_insensitive: bool) -> Self {
        Self { input, pattern, negated, case_insensitive }
    }
}

impl PhysicalExpr for LikeExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let input = self.input.evaluate(batch)?.as_array_ref()?;
        let pattern = self.pattern.evaluate(batch)?.as_array_ref()?;
        if self.case_insensitive {
            return Err(strata_common::internal_error("ILIKE is not yet supported"));
        }
        let result = if self.negated { nlike(&input, &pattern)? } else { like(&input, &pattern)? };
        Ok(ColumnarValue::Array(Arc::new(result)))
    }

    fn logical_type(&self) -> LogicalType {
        LogicalType::Boolean
    }
}

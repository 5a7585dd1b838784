use arrow::array::BooleanArray;
use arrow::compute::kernels::zip::zip;
use strata_common::{internal_error, Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

pub struct CaseWhenThen {
    pub when: PhysicalExprRef,
    pub then: PhysicalExprRef,
}

/// `CASE WHEN ... THEN ... ELSE ... END`, evaluated right-to-left: the
/// accumulator starts as the `ELSE` arm (or an all-null column of the
/// branches' type) and each branch's `THEN` is selected into it via arrow's
/// `zip` row mask, so an earlier branch always wins over a later default —
/// this is the "row-mask" selection called for by §4.6, though every branch
/// is still evaluated eagerly rather than skipped.
pub struct CaseExpr {
    branches: Vec<CaseWhenThen>,
    else_branch: Option<PhysicalExprRef>,
    logical_type: LogicalType,
}

impl CaseExpr {
    pub fn new(branches: Vec<CaseWhenThen>, else_branch: Option<PhysicalExprRef>, logical_type: LogicalType) -> Self {
        Self { branches, else_branch, logical_type }
    }
}

impl std::fmt::Debug for CaseExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CaseExpr({} branches)", self.branches.len())
    }
}

impl PhysicalExpr for CaseExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let num_rows = batch.num_rows();
        let mut acc = match &self.else_branch {
            Some(expr) => expr.evaluate(batch)?.into_array(num_rows)?,
            None => arrow::array::new_null_array(&self.logical_type.to_arrow(), num_rows),
        };

        for branch in self.branches.iter().rev() {
            let mask = branch.when.evaluate(batch)?.into_array(num_rows)?;
            let mask = mask
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| internal_error("CASE WHEN condition did not evaluate to BOOLEAN"))?;
            let then = branch.then.evaluate(batch)?.into_array(num_rows)?;
            acc = zip(mask, &then, &acc)?;
        }

        Ok(ColumnarValue::Array(acc))
    }

    fn logical_type(&self) -> LogicalType {
        self.logical_type.clone()
    }
}

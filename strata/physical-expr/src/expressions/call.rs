use strata_common::{Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;
use crate::functions::ScalarFunctionImpl;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// A resolved call into the function registry. Resolution happens once at
/// compile time (`compile.rs` looks the name up and bakes the closure in),
/// so evaluation never re-does a registry lookup per batch.
pub struct CallExpr {
    name: String,
    args: Vec<PhysicalExprRef>,
    implementation: ScalarFunctionImpl,
    return_type: LogicalType,
}

impl CallExpr {
    pub fn new(name: String, args: Vec<PhysicalExprRef>, implementation: ScalarFunctionImpl, return_type: LogicalType) -> Self {
        Self { name, args, implementation, return_type }
    }
}

impl std::fmt::Debug for CallExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CallExpr({})", self.name)
    }
}

impl PhysicalExpr for CallExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let values = self
            .args
            .iter()
            .map(|a| a.evaluate(batch))
            .collect::<Result<Vec<_>>>()?;
        (self.implementation)(&values, batch.num_rows())
    }

    fn logical_type(&self) -> LogicalType {
        self.return_type.clone()
    }
}

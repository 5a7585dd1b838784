//! The compiled counterpart of `strata_expr::Expr`: a tree of closures over
//! arrow arrays rather than an AST node, so evaluation never re-dispatches on
//! node kind per batch.

use std::fmt::Debug;
use std::sync::Arc;
use strata_common::{Batch, LogicalType, Result};

use crate::columnar_value::ColumnarValue;

pub trait PhysicalExpr: Debug + Send + Sync {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue>;

    /// Cloned rather than borrowed: some nodes (e.g. boolean operators)
    /// compute their type rather than store it, and a borrow tied to `&self`
    /// would force every node to carry a field purely to have somewhere to
    /// point.
    fn logical_type(&self) -> LogicalType;

    fn nullable(&self) -> bool {
        true
    }
}

pub type PhysicalExprRef = Arc<dyn PhysicalExpr>;

//! The result of evaluating a `PhysicalExpr`: either a full column or a
//! single scalar that applies to every row (mirrors the teacher's
//! `ColumnarValue`, avoiding a broadcast allocation until one is required).

use arrow::array::ArrayRef;
use strata_common::{internal_error, LogicalType, Result, ScalarValue};

use crate::convert::scalar_to_array;

#[derive(Clone, Debug)]
pub enum ColumnarValue {
    Array(ArrayRef),
    Scalar(ScalarValue),
}

impl ColumnarValue {
    pub fn logical_type(&self) -> Result<LogicalType> {
        match self {
            ColumnarValue::Array(array) => LogicalType::try_from_arrow(array.data_type()),
            ColumnarValue::Scalar(value) => Ok(value.logical_type()),
        }
    }

    /// Materializes a scalar into a length-`num_rows` array; a column passes
    /// through unchanged. Arrow's `Datum`-based kernels accept a length-1
    /// array directly, so this is only needed where a kernel requires equal
    /// lengths.
    pub fn into_array(self, num_rows: usize) -> Result<ArrayRef> {
        match self {
            ColumnarValue::Array(array) => Ok(array),
            ColumnarValue::Scalar(value) => scalar_to_array(&value, num_rows),
        }
    }

    pub fn as_array_ref(&self) -> Result<ArrayRef> {
        match self {
            ColumnarValue::Array(array) => Ok(array.clone()),
            ColumnarValue::Scalar(value) => scalar_to_array(value, 1),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ColumnarValue::Scalar(_))
    }
}

pub(crate) fn unsupported(op: &str, ty: &LogicalType) -> strata_common::StrataError {
    internal_error(format!("{op} is not supported for type {ty}"))
}

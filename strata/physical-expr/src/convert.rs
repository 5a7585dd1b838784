//! Conversions between `ScalarValue` and arrow arrays. Broadcasting a scalar
//! to a length-`n` array is only needed where a kernel requires matching
//! lengths; arrow's `Datum`-based comparison/arithmetic kernels accept a
//! length-1 array directly and broadcast internally.

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float64Array,
    Int64Array, IntervalMonthDayNanoArray, ListArray, StringArray, TimestampMicrosecondArray,
};
use arrow::buffer::OffsetBuffer;
use arrow_schema::{DataType, Field};
use std::sync::Arc;
use strata_common::{internal_error, LogicalType, Result, ScalarValue};

pub fn scalar_to_array(value: &ScalarValue, len: usize) -> Result<ArrayRef> {
    Ok(match value {
        ScalarValue::Boolean(v) => Arc::new(BooleanArray::from(vec![*v; len])),
        ScalarValue::Int64(v) => Arc::new(Int64Array::from(vec![*v; len])),
        ScalarValue::Double(v) => Arc::new(Float64Array::from(vec![*v; len])),
        ScalarValue::Decimal128(v, p, s) => {
            Arc::new(Decimal128Array::from(vec![*v; len]).with_precision_and_scale(*p, *s)?)
        }
        ScalarValue::Utf8(v) => Arc::new(StringArray::from(vec![v.as_deref(); len])),
        ScalarValue::Blob(v) => Arc::new(BinaryArray::from(vec![v.as_deref(); len])),
        ScalarValue::Date(v) => Arc::new(Date32Array::from(vec![*v; len])),
        ScalarValue::Timestamp(v) => Arc::new(TimestampMicrosecondArray::from(vec![*v; len])),
        ScalarValue::Interval(v) => {
            Arc::new(IntervalMonthDayNanoArray::from(vec![v.map(pack_month_day_nano); len]))
        }
        ScalarValue::Array(items, inner_type) => repeated_list_array(items, inner_type, len)?,
        ScalarValue::Null => {
            return Err(internal_error("cannot materialize an untyped NULL into an array"))
        }
    })
}

/// Matches `arrow_array::types::IntervalMonthDayNanoType::make_value`'s bit
/// layout: months in the high 32 bits, days in the next 32, nanoseconds in
/// the low 64, all within one `i128`.
pub fn pack_month_day_nano((months, days, nanoseconds): (i32, i32, i64)) -> i128 {
    ((months as i128) << 96) | (((days as u32) as i128) << 64) | ((nanoseconds as u64) as i128)
}

pub fn unpack_month_day_nano(value: i128) -> (i32, i32, i64) {
    let months = (value >> 96) as i32;
    let days = (value >> 64) as i32;
    let nanoseconds = value as i64;
    (months, days, nanoseconds)
}

fn repeated_list_array(items: &[ScalarValue], inner_type: &LogicalType, len: usize) -> Result<ArrayRef> {
    let one_row: ArrayRef = if items.is_empty() {
        arrow::array::new_empty_array(&inner_type.to_arrow())
    } else {
        let parts = items
            .iter()
            .map(|v| scalar_to_array(v, 1))
            .collect::<Result<Vec<_>>>()?;
        arrow::compute::concat(&parts.iter().map(|a| a.as_ref()).collect::<Vec<_>>())?
    };
    let field = Arc::new(Field::new("item", inner_type.to_arrow(), true));
    let offsets = OffsetBuffer::from_lengths(std::iter::repeat(items.len()).take(len));
    let values: ArrayRef = if len == 0 { one_row.slice(0, 0) } else { arrow::compute::concat(&vec![one_row.as_ref(); len])? };
    Ok(Arc::new(ListArray::try_new(field, offsets, values, None)?))
}

/// Arrow's cast kernel, used to compile a logical `Cast` node and to coerce
/// mismatched operand types ahead of a binary kernel.
pub fn cast_array(array: &ArrayRef, to: &DataType) -> Result<ArrayRef> {
    Ok(arrow::compute::cast(array, to)?)
}

/// Assembles one column from one `ScalarValue` per output row — the shape
/// `HashAggregate`/`HashJoin` build side materialization need when turning
/// per-group or per-key scalars back into a batch column. Unlike
/// `scalar_to_array`, each value occupies exactly one row rather than being
/// broadcast.
pub fn scalar_vec_to_array(values: &[ScalarValue], logical_type: &LogicalType) -> Result<ArrayRef> {
    if values.is_empty() {
        return Ok(arrow::array::new_empty_array(&logical_type.to_arrow()));
    }
    let parts = values
        .iter()
        .map(|v| if v.is_null() { scalar_to_array(&null_like(logical_type), 1) } else { scalar_to_array(v, 1) })
        .collect::<Result<Vec<_>>>()?;
    Ok(arrow::compute::concat(&parts.iter().map(|a| a.as_ref()).collect::<Vec<_>>())?)
}

/// A typed null `ScalarValue` matching `logical_type`, so a `ScalarValue::Null`
/// (untyped) can still be materialized by `scalar_vec_to_array`.
fn null_like(logical_type: &LogicalType) -> ScalarValue {
    match logical_type {
        LogicalType::Boolean => ScalarValue::Boolean(None),
        LogicalType::Int64 => ScalarValue::Int64(None),
        LogicalType::Double => ScalarValue::Double(None),
        LogicalType::Decimal(p, s) => ScalarValue::Decimal128(None, *p, *s),
        LogicalType::Varchar => ScalarValue::Utf8(None),
        LogicalType::Blob => ScalarValue::Blob(None),
        LogicalType::Date => ScalarValue::Date(None),
        LogicalType::Timestamp => ScalarValue::Timestamp(None),
        LogicalType::Interval => ScalarValue::Interval(None),
        LogicalType::Array(inner) => ScalarValue::Array(Vec::new(), (**inner).clone()),
        LogicalType::Struct(_) => ScalarValue::Null,
    }
}

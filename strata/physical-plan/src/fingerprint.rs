//! The 64-bit row fingerprint shared by `HashAggregate` and `HashJoin`
//! (§4.8/§4.9): a hash over canonicalized byte images of the key columns.
//! Collisions are resolved by the caller comparing full key values — the
//! fingerprint is only ever used to choose a hash-table bucket.

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::DataType;
use hashbrown::hash_map::DefaultHashBuilder;
use std::hash::{BuildHasher, Hash, Hasher};
use strata_common::{internal_error, Result};

/// A comparable, hashable snapshot of one row's key values, used both as the
/// fingerprint input and as the tie-breaker for fingerprint collisions.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Null,
    Bool(bool),
    Int64(i64),
    Double(u64), // bit pattern, so NaN/−0.0 compare and hash consistently
    Bytes(Vec<u8>),
}

impl Eq for KeyValue {}

impl Hash for KeyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            KeyValue::Null => {}
            KeyValue::Bool(b) => b.hash(state),
            KeyValue::Int64(v) => v.hash(state),
            KeyValue::Double(bits) => bits.hash(state),
            KeyValue::Bytes(b) => b.hash(state),
        }
    }
}

pub type RowKey = Vec<KeyValue>;

/// Extracts the key tuple for row `row` across all `columns`, SQL
/// null-equals-null = false semantics left to the caller (a fingerprint
/// collision with a `Null` component still compares via `RowKey::eq`, so the
/// caller decides whether nulls-match-nulls for its use case).
pub fn row_key(columns: &[ArrayRef], row: usize) -> Result<RowKey> {
    columns.iter().map(|c| key_value(c, row)).collect()
}

fn key_value(array: &ArrayRef, row: usize) -> Result<KeyValue> {
    use arrow::array::{Array, AsArray};
    if array.is_null(row) {
        return Ok(KeyValue::Null);
    }
    Ok(match array.data_type() {
        DataType::Boolean => KeyValue::Bool(array.as_boolean().value(row)),
        DataType::Int64 => KeyValue::Int64(array.as_primitive::<arrow::datatypes::Int64Type>().value(row)),
        DataType::Float64 => {
            KeyValue::Double(array.as_primitive::<arrow::datatypes::Float64Type>().value(row).to_bits())
        }
        DataType::Date32 => KeyValue::Int64(array.as_primitive::<arrow::datatypes::Date32Type>().value(row) as i64),
        DataType::Timestamp(_, _) => {
            KeyValue::Int64(array.as_primitive::<arrow::datatypes::TimestampMicrosecondType>().value(row))
        }
        DataType::Utf8 => KeyValue::Bytes(array.as_string::<i32>().value(row).as_bytes().to_vec()),
        DataType::LargeUtf8 => KeyValue::Bytes(array.as_string::<i64>().value(row).as_bytes().to_vec()),
        DataType::Binary => KeyValue::Bytes(array.as_binary::<i32>().value(row).to_vec()),
        DataType::Decimal128(_, _) => {
            KeyValue::Int64(array.as_primitive::<arrow::datatypes::Decimal128Type>().value(row) as i64)
        }
        other => return Err(internal_error(format!("unsupported key column type: {other}"))),
    })
}

/// Hashes a `RowKey` into the 64-bit fingerprint used to pick a bucket.
pub fn fingerprint(key: &RowKey) -> u64 {
    let builder = DefaultHashBuilder::default();
    let mut hasher = builder.build_hasher();
    key.hash(&mut hasher);
    hasher.finish()
}

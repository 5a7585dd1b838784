//! A single typed, possibly-null value. `Literal` expression nodes and the
//! folded result of `constant_fold_expression` are both `ScalarValue`s.

use crate::schema::LogicalType;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone)]
pub enum ScalarValue {
    Boolean(Option<bool>),
    Int64(Option<i64>),
    Double(Option<f64>),
    Decimal128(Option<i128>, u8, i8),
    Utf8(Option<String>),
    Blob(Option<Vec<u8>>),
    /// Days since the Unix epoch.
    Date(Option<i32>),
    /// Microseconds since the Unix epoch.
    Timestamp(Option<i64>),
    /// `(months, days, nanoseconds)`, matching arrow's `MonthDayNano`.
    Interval(Option<(i32, i32, i64)>),
    Array(Vec<ScalarValue>, LogicalType),
    Null,
}

impl ScalarValue {
    pub fn logical_type(&self) -> LogicalType {
        match self {
            ScalarValue::Boolean(_) => LogicalType::Boolean,
            ScalarValue::Int64(_) => LogicalType::Int64,
            ScalarValue::Double(_) => LogicalType::Double,
            ScalarValue::Decimal128(_, p, s) => LogicalType::Decimal(*p, *s),
            ScalarValue::Utf8(_) => LogicalType::Varchar,
            ScalarValue::Blob(_) => LogicalType::Blob,
            ScalarValue::Date(_) => LogicalType::Date,
            ScalarValue::Timestamp(_) => LogicalType::Timestamp,
            ScalarValue::Interval(_) => LogicalType::Interval,
            ScalarValue::Array(_, inner) => LogicalType::Array(Box::new(inner.clone())),
            ScalarValue::Null => LogicalType::Varchar,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(
            self,
            ScalarValue::Boolean(None)
                | ScalarValue::Int64(None)
                | ScalarValue::Double(None)
                | ScalarValue::Decimal128(None, _, _)
                | ScalarValue::Utf8(None)
                | ScalarValue::Blob(None)
                | ScalarValue::Date(None)
                | ScalarValue::Timestamp(None)
                | ScalarValue::Interval(None)
                | ScalarValue::Null
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Boolean(v) => *v,
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Boolean(Some(v)) => write!(f, "{v}"),
            ScalarValue::Int64(Some(v)) => write!(f, "{v}"),
            ScalarValue::Double(Some(v)) => write!(f, "{v}"),
            ScalarValue::Decimal128(Some(v), _, s) => write!(f, "{v}e-{s}"),
            ScalarValue::Utf8(Some(v)) => write!(f, "'{v}'"),
            ScalarValue::Blob(Some(v)) => write!(f, "0x{}", hex_encode(v)),
            ScalarValue::Date(Some(v)) => write!(f, "DATE({v})"),
            ScalarValue::Timestamp(Some(v)) => write!(f, "TIMESTAMP({v})"),
            ScalarValue::Interval(Some((m, d, n))) => write!(f, "INTERVAL({m}m {d}d {n}ns)"),
            ScalarValue::Array(items, _) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            _ => write!(f, "NULL"),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Three-valued comparison: `None` means the comparison's truth value is
/// unknown (one or both operands are null), matching §4.6's null semantics.
impl ScalarValue {
    pub fn try_cmp(&self, other: &ScalarValue) -> Option<Ordering> {
        use ScalarValue::*;
        match (self, other) {
            (Boolean(Some(a)), Boolean(Some(b))) => a.partial_cmp(b),
            (Int64(Some(a)), Int64(Some(b))) => a.partial_cmp(b),
            (Double(Some(a)), Double(Some(b))) => a.partial_cmp(b),
            (Int64(Some(a)), Double(Some(b))) => (*a as f64).partial_cmp(b),
            (Double(Some(a)), Int64(Some(b))) => a.partial_cmp(&(*b as f64)),
            (Utf8(Some(a)), Utf8(Some(b))) => a.partial_cmp(b),
            (Blob(Some(a)), Blob(Some(b))) => a.partial_cmp(b),
            (Date(Some(a)), Date(Some(b))) => a.partial_cmp(b),
            (Timestamp(Some(a)), Timestamp(Some(b))) => a.partial_cmp(b),
            // DATE compares equal to a TIMESTAMP at 00:00:00 on that date.
            (Date(Some(a)), Timestamp(Some(b))) => {
                (*a as i64 * 86_400_000_000).partial_cmp(b)
            }
            (Timestamp(Some(a)), Date(Some(b))) => {
                a.partial_cmp(&(*b as i64 * 86_400_000_000))
            }
            _ => None,
        }
    }
}

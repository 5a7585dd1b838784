//! The closed set of logical types and the `Schema`/`Field` types that carry
//! them through the planner. Two schemas are equivalent iff names, types and
//! order match (`PartialEq` is derived field-by-field, in order).

use std::fmt;
use std::sync::Arc;

/// The closed set of logical types the binder may attach to an expression.
///
/// Each variant maps onto exactly one `arrow_schema::DataType` so that a
/// `Batch` can be represented directly as an `arrow::record_batch::RecordBatch`
/// carrying this logical `Schema` alongside it.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalType {
    Boolean,
    Int64,
    Double,
    Decimal(u8, i8),
    Varchar,
    Blob,
    Date,
    Timestamp,
    Interval,
    Array(Box<LogicalType>),
    Struct(Vec<Field>),
}

impl LogicalType {
    /// The `arrow_schema::DataType` this logical type is carried in.
    pub fn to_arrow(&self) -> arrow_schema::DataType {
        use arrow_schema::DataType as AT;
        match self {
            LogicalType::Boolean => AT::Boolean,
            LogicalType::Int64 => AT::Int64,
            LogicalType::Double => AT::Float64,
            LogicalType::Decimal(p, s) => AT::Decimal128(*p, *s),
            LogicalType::Varchar => AT::Utf8,
            LogicalType::Blob => AT::Binary,
            LogicalType::Date => AT::Date32,
            LogicalType::Timestamp => AT::Timestamp(arrow_schema::TimeUnit::Microsecond, None),
            LogicalType::Interval => {
                AT::Interval(arrow_schema::IntervalUnit::MonthDayNano)
            }
            LogicalType::Array(inner) => AT::List(Arc::new(arrow_schema::Field::new(
                "item",
                inner.to_arrow(),
                true,
            ))),
            LogicalType::Struct(fields) => AT::Struct(
                fields
                    .iter()
                    .map(|f| arrow_schema::Field::new(&f.name, f.logical_type.to_arrow(), f.nullable))
                    .collect(),
            ),
        }
    }

    /// The inverse of `to_arrow`, used when a physical expression needs to
    /// recover the logical type of an `arrow::array::ArrayRef` it didn't
    /// build itself (e.g. a connector's scan output).
    pub fn try_from_arrow(data_type: &arrow_schema::DataType) -> crate::Result<LogicalType> {
        use arrow_schema::DataType as AT;
        Ok(match data_type {
            AT::Boolean => LogicalType::Boolean,
            AT::Int64 => LogicalType::Int64,
            AT::Float64 => LogicalType::Double,
            AT::Decimal128(p, s) => LogicalType::Decimal(*p, *s),
            AT::Utf8 | AT::LargeUtf8 => LogicalType::Varchar,
            AT::Binary | AT::LargeBinary => LogicalType::Blob,
            AT::Date32 => LogicalType::Date,
            AT::Timestamp(_, _) => LogicalType::Timestamp,
            AT::Interval(_) => LogicalType::Interval,
            AT::List(field) => LogicalType::Array(Box::new(LogicalType::try_from_arrow(field.data_type())?)),
            AT::Struct(fields) => LogicalType::Struct(
                fields
                    .iter()
                    .map(|f| {
                        Ok(Field::new(
                            f.name().clone(),
                            LogicalType::try_from_arrow(f.data_type())?,
                            f.is_nullable(),
                        ))
                    })
                    .collect::<crate::Result<Vec<_>>>()?,
            ),
            other => {
                return Err(crate::internal_error(format!(
                    "no logical type corresponds to arrow type {other:?}"
                )))
            }
        })
    }

    /// True if comparing values of `self` and `other` never requires a coercion.
    pub fn is_numeric(&self) -> bool {
        matches!(self, LogicalType::Int64 | LogicalType::Double | LogicalType::Decimal(_, _))
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, LogicalType::Date | LogicalType::Timestamp | LogicalType::Interval)
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Boolean => write!(f, "BOOLEAN"),
            LogicalType::Int64 => write!(f, "INT64"),
            LogicalType::Double => write!(f, "DOUBLE"),
            LogicalType::Decimal(p, s) => write!(f, "DECIMAL({p},{s})"),
            LogicalType::Varchar => write!(f, "VARCHAR"),
            LogicalType::Blob => write!(f, "BLOB"),
            LogicalType::Date => write!(f, "DATE"),
            LogicalType::Timestamp => write!(f, "TIMESTAMP"),
            LogicalType::Interval => write!(f, "INTERVAL"),
            LogicalType::Array(inner) => write!(f, "ARRAY<{inner}>"),
            LogicalType::Struct(fields) => {
                write!(f, "STRUCT<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", field.name, field.logical_type)?;
                }
                write!(f, ">")
            }
        }
    }
}

/// One column of a `Schema`: `(column_name, logical_type, nullable)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, logical_type: LogicalType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable,
        }
    }
}

/// An ordered sequence of `Field`s. Plan nodes derive their output schema as
/// a pure function of their inputs' schemas and parameters (invariant 1).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index of a column by unqualified name. Ambiguity between multiple
    /// matching names is the binder's job to reject; this returns the first.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, idx: usize) -> &Field {
        &self.fields[idx]
    }

    /// Projects this schema down to the given column indices, preserving order.
    pub fn project(&self, indices: &[usize]) -> Schema {
        Schema::new(indices.iter().map(|&i| self.fields[i].clone()).collect())
    }

    /// Concatenates two schemas, used when building a join's output schema.
    pub fn join(&self, other: &Schema) -> Schema {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        Schema::new(fields)
    }

    /// The equivalent `arrow_schema::Schema`, used to allocate/validate the
    /// physical `RecordBatch` a `Batch` wraps.
    pub fn to_arrow(&self) -> arrow_schema::Schema {
        arrow_schema::Schema::new(
            self.fields
                .iter()
                .map(|f| arrow_schema::Field::new(&f.name, f.logical_type.to_arrow(), f.nullable))
                .collect::<Vec<_>>(),
        )
    }
}

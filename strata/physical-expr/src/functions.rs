//! The scalar function registry. Functions are registered by name and
//! dispatch on the already-bound argument `ColumnarValue`s; the binder has
//! already checked arity and inserted any necessary `Cast`s (§4.6).

use arrow::array::{Array, ArrayRef, BooleanArray, Int64Array, StringArray};
use arrow::compute::kernels::comparison::contains as substring_contains;
use std::collections::HashMap;
use std::sync::Arc;
use strata_common::{internal_error, LogicalType, Result, StrataError};

use crate::columnar_value::ColumnarValue;

pub type ScalarFunctionImpl = Arc<dyn Fn(&[ColumnarValue], usize) -> Result<ColumnarValue> + Send + Sync>;

#[derive(Clone)]
pub struct ScalarFunctionSignature {
    pub return_type: LogicalType,
    pub implementation: ScalarFunctionImpl,
}

#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, ScalarFunctionSignature>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_builtins();
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, signature: ScalarFunctionSignature) {
        self.functions.insert(name.into().to_ascii_uppercase(), signature);
    }

    pub fn lookup(&self, name: &str) -> Result<&ScalarFunctionSignature> {
        self.functions
            .get(&name.to_ascii_uppercase())
            .ok_or_else(|| StrataError::FunctionNotFound(name.to_string()))
    }

    fn register_builtins(&mut self) {
        self.register(
            "STARTS_WITH",
            ScalarFunctionSignature {
                return_type: LogicalType::Boolean,
                implementation: Arc::new(|args, rows| string_predicate(args, rows, |s, p| s.starts_with(p))),
            },
        );
        self.register(
            "ENDS_WITH",
            ScalarFunctionSignature {
                return_type: LogicalType::Boolean,
                implementation: Arc::new(|args, rows| string_predicate(args, rows, |s, p| s.ends_with(p))),
            },
        );
        self.register(
            "CONTAINS",
            ScalarFunctionSignature {
                return_type: LogicalType::Boolean,
                implementation: Arc::new(|args, rows| string_predicate(args, rows, |s, p| s.contains(p))),
            },
        );
        self.register(
            "LENGTH",
            ScalarFunctionSignature {
                return_type: LogicalType::Int64,
                implementation: Arc::new(string_length),
            },
        );
        self.register(
            "UPPER",
            ScalarFunctionSignature {
                return_type: LogicalType::Varchar,
                implementation: Arc::new(|args, rows| string_map(args, rows, |s| s.to_uppercase())),
            },
        );
        self.register(
            "LOWER",
            ScalarFunctionSignature {
                return_type: LogicalType::Varchar,
                implementation: Arc::new(|args, rows| string_map(args, rows, |s| s.to_lowercase())),
            },
        );
        self.register(
            "ARRAY_CONTAINS",
            ScalarFunctionSignature {
                return_type: LogicalType::Boolean,
                implementation: Arc::new(array_contains_any),
            },
        );
        self.register(
            "ARRAY_CONTAINS_ANY",
            ScalarFunctionSignature {
                return_type: LogicalType::Boolean,
                implementation: Arc::new(array_contains_any),
            },
        );
        self.register(
            "ARRAY_CONTAINS_ALL",
            ScalarFunctionSignature {
                return_type: LogicalType::Boolean,
                implementation: Arc::new(array_contains_all),
            },
        );
    }
}

fn as_strings(value: &ColumnarValue, rows: usize) -> Result<ArrayRef> {
    value.clone().into_array(rows)
}

fn downcast_str(array: &ArrayRef) -> Result<&StringArray> {
    array
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| internal_error("expected a VARCHAR argument"))
}

fn string_predicate(args: &[ColumnarValue], rows: usize, f: impl Fn(&str, &str) -> bool) -> Result<ColumnarValue> {
    let input = as_strings(&args[0], rows)?;
    let pattern = as_strings(&args[1], rows)?;
    let input = downcast_str(&input)?;
    let pattern = downcast_str(&pattern)?;
    let result: BooleanArray = input
        .iter()
        .zip(pattern.iter())
        .map(|(s, p)| match (s, p) {
            (Some(s), Some(p)) => Some(f(s, p)),
            _ => None,
        })
        .collect();
    Ok(ColumnarValue::Array(Arc::new(result)))
}

fn string_map(args: &[ColumnarValue], rows: usize, f: impl Fn(&str) -> String) -> Result<ColumnarValue> {
    let input = as_strings(&args[0], rows)?;
    let input = downcast_str(&input)?;
    let result: StringArray = input.iter().map(|s| s.map(&f)).collect();
    Ok(ColumnarValue::Array(Arc::new(result)))
}

fn string_length(args: &[ColumnarValue], rows: usize) -> Result<ColumnarValue> {
    let input = as_strings(&args[0], rows)?;
    let input = downcast_str(&input)?;
    let result: Int64Array = input.iter().map(|s| s.map(|s| s.chars().count() as i64)).collect();
    Ok(ColumnarValue::Array(Arc::new(result)))
}

/// `ARRAY_CONTAINS`/`_ANY`: rewritten from `v = ANY(col)` chains by
/// `predicate_rewriter_anyeq_to_contains`. Operates on VARCHAR-cast operands
/// via arrow's substring kernel; the binder casts array/struct membership
/// checks down to this shape before compilation.
fn array_contains_any(args: &[ColumnarValue], rows: usize) -> Result<ColumnarValue> {
    let haystack = as_strings(&args[0], rows)?;
    let needle = as_strings(&args[1], rows)?;
    let haystack = downcast_str(&haystack)?;
    let needle = downcast_str(&needle)?;
    Ok(ColumnarValue::Array(Arc::new(substring_contains(haystack, needle)?)))
}

/// `ARRAY_CONTAINS_ALL`: rewritten from a chain of ANDed `ANY` checks — every
/// needle in the list must match. `args[1..]` holds one needle per element
/// of the original `ALL(...)` list.
fn array_contains_all(args: &[ColumnarValue], rows: usize) -> Result<ColumnarValue> {
    let haystack = as_strings(&args[0], rows)?;
    let haystack = downcast_str(&haystack)?;
    let mut acc = BooleanArray::from(vec![true; rows.max(haystack.len())]);
    for needle in &args[1..] {
        let needle = as_strings(needle, rows)?;
        let needle = downcast_str(&needle)?;
        let matched = substring_contains(haystack, needle)?;
        acc = arrow::compute::kernels::boolean::and_kleene(&acc, &matched)?;
    }
    Ok(ColumnarValue::Array(Arc::new(acc)))
}

use arrow::array::{Array, ArrayRef, BooleanArray, Int64Array, StringArray};
use arrow::compute::kernels::numeric::{add, div, mul, sub};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;
use strata_common::{internal_error, Batch, LogicalType, Result, StrataError};
use strata_expr::ArithmeticOp;

use crate::columnar_value::ColumnarValue;
use crate::convert::cast_array;
use crate::physical_expr::{PhysicalExpr, PhysicalExprRef};

/// SQL numeric widening: int widens to double when mixed with a double;
/// decimal widens to double outside exact decimal-decimal arithmetic, which
/// this engine does not attempt to keep exact (no variable-precision
/// decimal accumulator at this layer — see the aggregation core instead).
pub fn infer_arithmetic_type(op: ArithmeticOp, left: &LogicalType, right: &LogicalType) -> Result<LogicalType> {
    use LogicalType::*;
    Ok(match (op, left, right) {
        (ArithmeticOp::Concat, _, _) => Varchar,
        (ArithmeticOp::BitOr, Varchar, Varchar) => Boolean,
        (ArithmeticOp::BitOr, Int64, Int64) => Int64,
        (ArithmeticOp::Divide, _, _) => Double,
        (ArithmeticOp::IntDivide, Int64, Int64) => Int64,
        (ArithmeticOp::IntDivide, _, _) => Int64,
        (_, Timestamp, Interval) | (_, Interval, Timestamp) => Timestamp,
        (_, Timestamp, Timestamp) => Interval,
        (_, Interval, Interval) => Interval,
        (_, Int64, Int64) => Int64,
        (_, Double, _) | (_, _, Double) => Double,
        (_, Decimal(p, s), Decimal(_, _)) => Decimal(*p, *s),
        (_, Decimal(p, s), Int64) | (_, Int64, Decimal(p, s)) => Decimal(*p, *s),
        _ => {
            return Err(internal_error(format!(
                "no arithmetic result type for {op} between {left} and {right}"
            )))
        }
    })
}

#[derive(Debug)]
pub struct ArithmeticExpr {
    op: ArithmeticOp,
    left: PhysicalExprRef,
    right: PhysicalExprRef,
    logical_type: LogicalType,
}

impl ArithmeticExpr {
    pub fn new(op: ArithmeticOp, left: PhysicalExprRef, right: PhysicalExprRef) -> Result<Self> {
        let logical_type = infer_arithmetic_type(op, &left.logical_type(), &right.logical_type())?;
        Ok(Self { op, left, right, logical_type })
    }
}

impl PhysicalExpr for ArithmeticExpr {
    fn evaluate(&self, batch: &Batch) -> Result<ColumnarValue> {
        let left = self.left.evaluate(batch)?.as_array_ref()?;
        let right = self.right.evaluate(batch)?.as_array_ref()?;
        let result: ArrayRef = match self.op {
            ArithmeticOp::Add => Arc::new(add(&left, &right)?),
            ArithmeticOp::Subtract => Arc::new(sub(&left, &right)?),
            ArithmeticOp::Multiply => Arc::new(mul(&left, &right)?),
            ArithmeticOp::Divide => {
                let left = cast_array(&left, &arrow_schema::DataType::Float64)?;
                let right = cast_array(&right, &arrow_schema::DataType::Float64)?;
                Arc::new(div(&left, &right)?)
            }
            ArithmeticOp::IntDivide => {
                let quotient = div(&left, &right)?;
                cast_array(&Arc::new(quotient), &arrow_schema::DataType::Int64)?
            }
            ArithmeticOp::Modulo => int_modulo(&left, &right)?,
            ArithmeticOp::Concat => string_concat(&left, &right)?,
            ArithmeticOp::BitOr => bit_or_or_cidr(&left, &right)?,
        };
        Ok(ColumnarValue::Array(result))
    }

    fn logical_type(&self) -> LogicalType {
        self.logical_type.clone()
    }
}

fn int_modulo(left: &ArrayRef, right: &ArrayRef) -> Result<ArrayRef> {
    let left = as_int64(left)?;
    let right = as_int64(right)?;
    let values: Int64Array = left
        .iter()
        .zip(right.iter())
        .map(|(l, r)| match (l, r) {
            (Some(l), Some(r)) if r != 0 => Some(l % r),
            _ => None,
        })
        .collect();
    Ok(Arc::new(values))
}

fn string_concat(left: &ArrayRef, right: &ArrayRef) -> Result<ArrayRef> {
    let left = as_utf8(left)?;
    let right = as_utf8(right)?;
    let values: StringArray = left
        .iter()
        .zip(right.iter())
        .map(|(l, r)| match (l, r) {
            (Some(l), Some(r)) => Some(format!("{l}{r}")),
            _ => None,
        })
        .collect();
    Ok(Arc::new(values))
}

/// `|` is overloaded: two IPv4 operands mean CIDR containment
/// (`'10.1.2.3' | '10.1.0.0/16'`); two integer operands mean bitwise OR.
/// Anything else is `IncorrectType`, matching §4.6's dispatch-by-operand-type
/// rule.
fn bit_or_or_cidr(left: &ArrayRef, right: &ArrayRef) -> Result<ArrayRef> {
    if let (Some(left), Some(right)) = (left.as_any().downcast_ref::<StringArray>(), right.as_any().downcast_ref::<StringArray>()) {
        let values: BooleanArray = left
            .iter()
            .zip(right.iter())
            .map(|(l, r)| match (l, r) {
                (Some(l), Some(r)) => cidr_contains(r, l).ok(),
                _ => None,
            })
            .collect();
        return Ok(Arc::new(values));
    }
    if let (Some(left), Some(right)) = (left.as_any().downcast_ref::<Int64Array>(), right.as_any().downcast_ref::<Int64Array>()) {
        let values: Int64Array = left
            .iter()
            .zip(right.iter())
            .map(|(l, r)| match (l, r) {
                (Some(l), Some(r)) => Some(l | r),
                _ => None,
            })
            .collect();
        return Ok(Arc::new(values));
    }
    Err(StrataError::IncorrectType(
        "`|` requires two INT64 operands or two VARCHAR (IPv4/CIDR) operands".to_string(),
    ))
}

fn cidr_contains(cidr: &str, address: &str) -> std::result::Result<bool, ()> {
    let (network, prefix_len) = match cidr.split_once('/') {
        Some((net, len)) => (net, len.parse::<u32>().map_err(|_| ())?),
        None => (cidr, 32),
    };
    let network = Ipv4Addr::from_str(network).map_err(|_| ())?;
    let address = Ipv4Addr::from_str(address).map_err(|_| ())?;
    if prefix_len > 32 {
        return Err(());
    }
    let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
    Ok(u32::from(network) & mask == u32::from(address) & mask)
}

fn as_int64(array: &ArrayRef) -> Result<Int64Array> {
    let casted = cast_array(array, &arrow_schema::DataType::Int64)?;
    Ok(casted.as_any().downcast_ref::<Int64Array>().unwrap().clone())
}

fn as_utf8(array: &ArrayRef) -> Result<StringArray> {
    let casted = cast_array(array, &arrow_schema::DataType::Utf8)?;
    Ok(casted.as_any().downcast_ref::<StringArray>().unwrap().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_containment_matches_same_network() {
        assert_eq!(cidr_contains("10.1.0.0/16", "10.1.2.3"), Ok(true));
        assert_eq!(cidr_contains("10.1.0.0/16", "10.2.2.3"), Ok(false));
    }

    #[test]
    fn modulo_by_zero_is_null_not_a_panic() {
        let left = Int64Array::from(vec![Some(10)]);
        let right = Int64Array::from(vec![Some(0)]);
        let result = int_modulo(&(Arc::new(left) as ArrayRef), &(Arc::new(right) as ArrayRef)).unwrap();
        let result = result.as_any().downcast_ref::<Int64Array>().unwrap();
        assert!(result.is_null(0));
    }
}

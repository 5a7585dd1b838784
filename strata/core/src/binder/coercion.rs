//! Implicit coercion rules (§4.1): numeric types widen to the wider type,
//! `DATE` compares equal to a `TIMESTAMP` at 00:00:00 on that date,
//! string/blob compare bytewise, anything else without a defined coercion
//! raises `IncompatibleTypes`.

use strata_common::{LogicalType, Result, StrataError};

/// The common type two operands of a comparison or arithmetic op should be
/// cast to before evaluation, or an error if no coercion is defined.
pub fn common_type(left: &LogicalType, right: &LogicalType) -> Result<LogicalType> {
    use LogicalType::*;
    if left == right {
        return Ok(left.clone());
    }
    match (left, right) {
        (Int64, Double) | (Double, Int64) => Ok(Double),
        (Int64, Decimal(p, s)) | (Decimal(p, s), Int64) => Ok(Decimal(*p, *s)),
        (Double, Decimal(_, _)) | (Decimal(_, _), Double) => Ok(Double),
        (Date, Timestamp) | (Timestamp, Date) => Ok(Timestamp),
        (Varchar, Blob) | (Blob, Varchar) => Ok(Blob),
        _ => Err(StrataError::IncompatibleTypes(format!("{left} vs {right}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_types_need_no_coercion() {
        assert_eq!(common_type(&LogicalType::Int64, &LogicalType::Int64).unwrap(), LogicalType::Int64);
    }

    #[test]
    fn int_and_double_widen_to_double() {
        assert_eq!(common_type(&LogicalType::Int64, &LogicalType::Double).unwrap(), LogicalType::Double);
    }

    #[test]
    fn date_and_timestamp_coerce_to_timestamp() {
        assert_eq!(common_type(&LogicalType::Date, &LogicalType::Timestamp).unwrap(), LogicalType::Timestamp);
    }

    #[test]
    fn unrelated_types_are_incompatible() {
        assert!(matches!(common_type(&LogicalType::Boolean, &LogicalType::Varchar), Err(StrataError::IncompatibleTypes(_))));
    }
}

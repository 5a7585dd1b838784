//! The restricted DNF predicate shape connectors receive, grounded on the
//! original engine's filter representation: a predicate is a single
//! `(column, op, literal)` comparison, a list of such tuples ANDed together,
//! or a list of lists ORed together.

use strata_common::ScalarValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnfOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Like,
    NotLike,
}

impl fmt::Display for DnfOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DnfOp::Eq => "=",
            DnfOp::NotEq => "!=",
            DnfOp::Lt => "<",
            DnfOp::LtEq => "<=",
            DnfOp::Gt => ">",
            DnfOp::GtEq => ">=",
            DnfOp::In => "IN",
            DnfOp::NotIn => "NOT IN",
            DnfOp::IsNull => "IS NULL",
            DnfOp::IsNotNull => "IS NOT NULL",
            DnfOp::Like => "LIKE",
            DnfOp::NotLike => "NOT LIKE",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct DnfComparison {
    pub column: String,
    pub op: DnfOp,
    /// Absent for `IN`/`NOT IN`, which use `values` instead.
    pub value: Option<ScalarValue>,
    pub values: Vec<ScalarValue>,
}

/// A predicate pushed to a connector: single comparisons composed with AND
/// (all tuples in the same list) and OR (adjacent lists), matching §4.7's
/// "restricted DNF of simple comparisons on a single column against a
/// literal".
#[derive(Debug, Clone)]
pub enum DnfPredicate {
    Comparison(DnfComparison),
    And(Vec<DnfPredicate>),
    Or(Vec<DnfPredicate>),
}

impl DnfPredicate {
    pub fn columns(&self) -> Vec<&str> {
        match self {
            DnfPredicate::Comparison(c) => vec![c.column.as_str()],
            DnfPredicate::And(parts) | DnfPredicate::Or(parts) => {
                parts.iter().flat_map(|p| p.columns()).collect()
            }
        }
    }
}

impl fmt::Display for DnfComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            DnfOp::In | DnfOp::NotIn => {
                write!(f, "{} {} (", self.column, self.op)?;
                for (i, v) in self.values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            DnfOp::IsNull | DnfOp::IsNotNull => write!(f, "{} {}", self.column, self.op),
            _ => write!(f, "{} {} {}", self.column, self.op, self.value.as_ref().expect("comparison carries a literal")),
        }
    }
}

/// Renders the predicate the way `EXPLAIN` shows a scan's pushed-down filter
/// (§6.6): `AND`-joined at the top level, parenthesized `OR` groups nested.
impl fmt::Display for DnfPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DnfPredicate::Comparison(c) => write!(f, "{c}"),
            DnfPredicate::And(parts) => {
                write!(f, "{}", parts.iter().map(ToString::to_string).collect::<Vec<_>>().join(" AND "))
            }
            DnfPredicate::Or(parts) => {
                write!(f, "({})", parts.iter().map(ToString::to_string).collect::<Vec<_>>().join(" OR "))
            }
        }
    }
}

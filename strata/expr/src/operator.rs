//! Comparison and arithmetic operators used by `Expr::Compare`/`Expr::Call`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Is,
    IsNot,
}

impl ComparisonOp {
    /// `NOT (a OP b)` rewritten to a single comparison, used by
    /// `boolean_rewrite_inversion`. `Is`/`IsNot` have no safe flip under
    /// three-valued null semantics, so they are excluded.
    pub fn negate(self) -> Option<ComparisonOp> {
        use ComparisonOp::*;
        match self {
            Eq => Some(NotEq),
            NotEq => Some(Eq),
            Lt => Some(GtEq),
            LtEq => Some(Gt),
            Gt => Some(LtEq),
            GtEq => Some(Lt),
            Is => None,
            IsNot => None,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::GtEq => ">=",
            ComparisonOp::Is => "IS",
            ComparisonOp::IsNot => "IS NOT",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    /// `/` — integer operands widen to `DOUBLE`.
    Divide,
    /// `DIV` — integer division.
    IntDivide,
    Modulo,
    /// `||` — string concatenation after implicit cast.
    Concat,
    /// Overloaded: CIDR containment for IP operands, bitwise OR for integers.
    BitOr,
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
            ArithmeticOp::IntDivide => "DIV",
            ArithmeticOp::Modulo => "%",
            ArithmeticOp::Concat => "||",
            ArithmeticOp::BitOr => "|",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptMode {
    GetMember,
    GetMemberAsString,
}

//! The scalar expression tree. Every node caches its resolved output type;
//! after binding, a `Column` always carries a resolved `(source, index)` pair
//! so no late identifier lookups occur during execution (invariant 2).

use crate::operator::{ArithmeticOp, ComparisonOp, SubscriptMode};
use strata_common::{LogicalType, ScalarValue};

/// A column reference resolved to an input index. `source` distinguishes
/// which child (0 or 1) the column comes from once a binary operator's
/// inputs have been bound; `None` means "the sole input".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub source: Option<usize>,
    pub index: usize,
}

/// A `CASE WHEN cond THEN result ... END` branch.
#[derive(Debug, Clone)]
pub struct CaseBranch {
    pub when: Expr,
    pub then: Expr,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Column(ColumnRef),
    Literal(ScalarValue, LogicalType),
    Call(String, Vec<Expr>, LogicalType),
    Cast(Box<Expr>, LogicalType),
    Case(Vec<CaseBranch>, Option<Box<Expr>>),
    Coalesce(Vec<Expr>),
    Subscript(Box<Expr>, Box<Expr>, SubscriptMode),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare(ComparisonOp, Box<Expr>, Box<Expr>),
    Arithmetic(ArithmeticOp, Box<Expr>, Box<Expr>),
    Between(Box<Expr>, Box<Expr>, Box<Expr>),
    InList(Box<Expr>, Vec<Expr>, bool),
    IsNull(Box<Expr>, bool),
    Like(Box<Expr>, Box<Expr>, bool, bool),
    /// An expression with an output alias, e.g. `SELECT x + 1 AS y`.
    Alias(Box<Expr>, String),
}

impl Expr {
    pub fn column(index: usize) -> Expr {
        Expr::Column(ColumnRef { source: None, index })
    }

    pub fn column_of(source: usize, index: usize) -> Expr {
        Expr::Column(ColumnRef {
            source: Some(source),
            index,
        })
    }

    pub fn lit(value: ScalarValue) -> Expr {
        let ty = value.logical_type();
        Expr::Literal(value, ty)
    }

    pub fn alias(self, name: impl Into<String>) -> Expr {
        Expr::Alias(Box::new(self), name.into())
    }

    /// The direct child expressions, in evaluation order. Used by rewrite
    /// rules that recurse without needing a generic tree-node abstraction.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Column(_) | Expr::Literal(_, _) => vec![],
            Expr::Call(_, args, _) => args.iter().collect(),
            Expr::Cast(e, _) => vec![e.as_ref()],
            Expr::Case(branches, else_) => {
                let mut v: Vec<&Expr> = Vec::new();
                for b in branches {
                    v.push(&b.when);
                    v.push(&b.then);
                }
                if let Some(e) = else_ {
                    v.push(e.as_ref());
                }
                v
            }
            Expr::Coalesce(args) => args.iter().collect(),
            Expr::Subscript(container, key, _) => vec![container.as_ref(), key.as_ref()],
            Expr::And(args) | Expr::Or(args) => args.iter().collect(),
            Expr::Not(e) => vec![e.as_ref()],
            Expr::Compare(_, l, r) => vec![l.as_ref(), r.as_ref()],
            Expr::Arithmetic(_, l, r) => vec![l.as_ref(), r.as_ref()],
            Expr::Between(e, lo, hi) => vec![e.as_ref(), lo.as_ref(), hi.as_ref()],
            Expr::InList(e, list, _) => {
                let mut v = vec![e.as_ref()];
                v.extend(list.iter());
                v
            }
            Expr::IsNull(e, _) => vec![e.as_ref()],
            Expr::Like(e, pattern, _, _) => vec![e.as_ref(), pattern.as_ref()],
            Expr::Alias(e, _) => vec![e.as_ref()],
        }
    }

    /// True if this expression references no columns — the precondition for
    /// `constant_fold_expression`.
    pub fn is_constant(&self) -> bool {
        !matches!(self, Expr::Column(_)) && self.children().iter().all(|c| c.is_constant())
    }

    /// Rebuilds this node with `children` standing in for the current
    /// children, in the same order `children()` returned them. Lets rewrite
    /// rules walk and simplify an expression tree generically.
    pub fn with_new_children(&self, mut children: Vec<Expr>) -> Expr {
        match self {
            Expr::Column(_) | Expr::Literal(_, _) => {
                debug_assert!(children.is_empty());
                self.clone()
            }
            Expr::Call(name, _, ty) => Expr::Call(name.clone(), children, ty.clone()),
            Expr::Cast(_, ty) => Expr::Cast(Box::new(children.remove(0)), ty.clone()),
            Expr::Case(branches, else_) => {
                let mut iter = children.into_iter();
                let new_branches = branches
                    .iter()
                    .map(|_| CaseBranch { when: iter.next().expect("when"), then: iter.next().expect("then") })
                    .collect();
                let new_else = else_.as_ref().map(|_| Box::new(iter.next().expect("else")));
                Expr::Case(new_branches, new_else)
            }
            Expr::Coalesce(_) => Expr::Coalesce(children),
            Expr::Subscript(_, _, mode) => {
                let key = children.remove(1);
                let container = children.remove(0);
                Expr::Subscript(Box::new(container), Box::new(key), *mode)
            }
            Expr::And(_) => Expr::And(children),
            Expr::Or(_) => Expr::Or(children),
            Expr::Not(_) => Expr::Not(Box::new(children.remove(0))),
            Expr::Compare(op, _, _) => {
                let r = children.remove(1);
                let l = children.remove(0);
                Expr::Compare(*op, Box::new(l), Box::new(r))
            }
            Expr::Arithmetic(op, _, _) => {
                let r = children.remove(1);
                let l = children.remove(0);
                Expr::Arithmetic(*op, Box::new(l), Box::new(r))
            }
            Expr::Between(_, _, _) => {
                let hi = children.remove(2);
                let lo = children.remove(1);
                let e = children.remove(0);
                Expr::Between(Box::new(e), Box::new(lo), Box::new(hi))
            }
            Expr::InList(_, _, negated) => {
                let e = children.remove(0);
                Expr::InList(Box::new(e), children, *negated)
            }
            Expr::IsNull(_, negated) => Expr::IsNull(Box::new(children.remove(0)), *negated),
            Expr::Like(_, _, case_insensitive, negated) => {
                let pattern = children.remove(1);
                let e = children.remove(0);
                Expr::Like(Box::new(e), Box::new(pattern), *case_insensitive, *negated)
            }
            Expr::Alias(_, name) => Expr::Alias(Box::new(children.remove(0)), name.clone()),
        }
    }

    /// All column references appearing anywhere in this expression, used by
    /// `predicate_pushdown`/`projection_pushdown` to test "column set ⊆
    /// child's output columns".
    pub fn column_refs(&self) -> Vec<ColumnRef> {
        match self {
            Expr::Column(c) => vec![*c],
            other => other.children().iter().flat_map(|c| c.column_refs()).collect(),
        }
    }
}

//! Lowers a `sqlparser` scalar expression into a bound `strata_expr::Expr`,
//! resolving every identifier to a `ColumnRef` and inserting `Cast` nodes
//! wherever §4.1's coercion rules require one. Grounded loosely on
//! `datafusion-sql`'s `SqlToRel::sql_expr_to_logical_expr` for the general
//! shape of a recursive-descent AST-to-`Expr` lowering, adapted throughout
//! since that teacher resolves columns by name against a `DFSchema` while
//! this binder resolves straight to an index (invariant 2).

use sqlparser::ast as sql;
use strata_common::{LogicalType, Result, ScalarValue, StrataError};
use strata_expr::operator::{ArithmeticOp, ComparisonOp};
use strata_expr::{CaseBranch, Expr};
use strata_physical_expr::FunctionRegistry;

use super::coercion::common_type;
use super::scope::Scope;

pub struct ExprBinder<'a> {
    pub scope: &'a Scope,
    pub schema: &'a strata_common::Schema,
    pub functions: &'a FunctionRegistry,
}

impl<'a> ExprBinder<'a> {
    pub fn bind(&self, expr: &sql::Expr) -> Result<Expr> {
        match expr {
            sql::Expr::Identifier(ident) => {
                let col = self.scope.resolve(None, &ident.value)?;
                Ok(Expr::Column(col))
            }
            sql::Expr::CompoundIdentifier(parts) => {
                let (qualifier, name) = split_compound(parts)?;
                let col = self.scope.resolve(Some(&qualifier), &name)?;
                Ok(Expr::Column(col))
            }
            sql::Expr::Value(value) => self.bind_value(value),
            sql::Expr::Nested(inner) => self.bind(inner),
            sql::Expr::UnaryOp { op, expr } => self.bind_unary(*op, expr),
            sql::Expr::BinaryOp { left, op, right } => self.bind_binary(left, *op, right),
            sql::Expr::IsNull(inner) => Ok(Expr::IsNull(Box::new(self.bind(inner)?), false)),
            sql::Expr::IsNotNull(inner) => Ok(Expr::IsNull(Box::new(self.bind(inner)?), true)),
            sql::Expr::Between { expr, negated, low, high } => {
                let bound = Expr::Between(Box::new(self.bind(expr)?), Box::new(self.bind(low)?), Box::new(self.bind(high)?));
                Ok(if *negated { Expr::Not(Box::new(bound)) } else { bound })
            }
            sql::Expr::InList { expr, list, negated } => {
                let values = list.iter().map(|e| self.bind(e)).collect::<Result<Vec<_>>>()?;
                Ok(Expr::InList(Box::new(self.bind(expr)?), values, *negated))
            }
            sql::Expr::Like { negated, expr, pattern, .. } => {
                Ok(Expr::Like(Box::new(self.bind(expr)?), Box::new(self.bind(pattern)?), false, *negated))
            }
            sql::Expr::ILike { negated, expr, pattern, .. } => {
                Ok(Expr::Like(Box::new(self.bind(expr)?), Box::new(self.bind(pattern)?), true, *negated))
            }
            sql::Expr::Cast { expr, data_type, .. } => {
                let ty = bind_data_type(data_type)?;
                Ok(Expr::Cast(Box::new(self.bind(expr)?), ty))
            }
            sql::Expr::Case { operand, conditions, results, else_result } => self.bind_case(operand, conditions, results, else_result),
            sql::Expr::Function(func) => self.bind_function(func),
            sql::Expr::CompoundFieldAccess { root, access_chain } => self.bind_subscript_chain(root, access_chain),
            other => Err(StrataError::UnsupportedSyntax(format!("expression not supported: {other}"))),
        }
    }

    fn bind_value(&self, value: &sql::Value) -> Result<Expr> {
        let scalar = match value {
            sql::Value::Number(n, _) => {
                if let Ok(i) = n.parse::<i64>() {
                    ScalarValue::Int64(Some(i))
                } else {
                    ScalarValue::Double(Some(n.parse::<f64>().map_err(|_| StrataError::SqlError(format!("bad numeric literal `{n}`")))?))
                }
            }
            sql::Value::SingleQuotedString(s) | sql::Value::DoubleQuotedString(s) => ScalarValue::Utf8(Some(s.clone())),
            sql::Value::Boolean(b) => ScalarValue::Boolean(Some(*b)),
            sql::Value::Null => ScalarValue::Null,
            other => return Err(StrataError::UnsupportedSyntax(format!("literal not supported: {other}"))),
        };
        Ok(Expr::lit(scalar))
    }

    fn bind_unary(&self, op: sql::UnaryOperator, operand: &sql::Expr) -> Result<Expr> {
        let bound = self.bind(operand)?;
        match op {
            sql::UnaryOperator::Not => Ok(Expr::Not(Box::new(bound))),
            sql::UnaryOperator::Minus => Ok(Expr::Arithmetic(ArithmeticOp::Subtract, Box::new(Expr::lit(ScalarValue::Int64(Some(0)))), Box::new(bound))),
            sql::UnaryOperator::Plus => Ok(bound),
            other => Err(StrataError::UnsupportedSyntax(format!("unary operator not supported: {other:?}"))),
        }
    }

    fn bind_binary(&self, left: &sql::Expr, op: sql::BinaryOperator, right: &sql::Expr) -> Result<Expr> {
        use sql::BinaryOperator as B;
        let bound_left = self.bind(left)?;
        let bound_right = self.bind(right)?;

        if let B::And = op {
            return Ok(Expr::And(vec![bound_left, bound_right]));
        }
        if let B::Or = op {
            return Ok(Expr::Or(vec![bound_left, bound_right]));
        }
        if let B::Arrow = op {
            return Ok(Expr::Subscript(Box::new(bound_left), Box::new(bound_right), strata_expr::SubscriptMode::GetMember));
        }
        if let B::LongArrow = op {
            return Ok(Expr::Subscript(Box::new(bound_left), Box::new(bound_right), strata_expr::SubscriptMode::GetMemberAsString));
        }

        let comparison = match op {
            B::Eq => Some(ComparisonOp::Eq),
            B::NotEq => Some(ComparisonOp::NotEq),
            B::Lt => Some(ComparisonOp::Lt),
            B::LtEq => Some(ComparisonOp::LtEq),
            B::Gt => Some(ComparisonOp::Gt),
            B::GtEq => Some(ComparisonOp::GtEq),
            _ => None,
        };
        if let Some(cmp) = comparison {
            let (l, r) = self.coerce_pair(bound_left, bound_right)?;
            return Ok(Expr::Compare(cmp, Box::new(l), Box::new(r)));
        }

        let arithmetic = match op {
            B::Plus => Some(ArithmeticOp::Add),
            B::Minus => Some(ArithmeticOp::Subtract),
            B::Multiply => Some(ArithmeticOp::Multiply),
            B::Divide => Some(ArithmeticOp::Divide),
            B::Modulo => Some(ArithmeticOp::Modulo),
            B::StringConcat => Some(ArithmeticOp::Concat),
            B::BitwiseOr => Some(ArithmeticOp::BitOr),
            _ => None,
        };
        if let Some(op) = arithmetic {
            let (l, r) = self.coerce_pair(bound_left, bound_right)?;
            return Ok(Expr::Arithmetic(op, Box::new(l), Box::new(r)));
        }

        Err(StrataError::UnsupportedSyntax(format!("binary operator not supported: {op:?}")))
    }

    /// Casts whichever side is the narrower type up to `common_type`.
    fn coerce_pair(&self, left: Expr, right: Expr) -> Result<(Expr, Expr)> {
        let lt = self.type_of(&left);
        let rt = self.type_of(&right);
        let common = common_type(&lt, &rt)?;
        let l = if lt == common { left } else { Expr::Cast(Box::new(left), common.clone()) };
        let r = if rt == common { right } else { Expr::Cast(Box::new(right), common) };
        Ok((l, r))
    }

    fn bind_case(
        &self,
        operand: &Option<Box<sql::Expr>>,
        conditions: &[sql::Expr],
        results: &[sql::Expr],
        else_result: &Option<Box<sql::Expr>>,
    ) -> Result<Expr> {
        let mut branches = Vec::with_capacity(conditions.len());
        for (cond, res) in conditions.iter().zip(results.iter()) {
            let when = match operand {
                Some(op) => {
                    let bound_op = self.bind(op)?;
                    let bound_cond = self.bind(cond)?;
                    let (l, r) = self.coerce_pair(bound_op, bound_cond)?;
                    Expr::Compare(ComparisonOp::Eq, Box::new(l), Box::new(r))
                }
                None => self.bind(cond)?,
            };
            branches.push(CaseBranch { when, then: self.bind(res)? });
        }
        let else_ = else_result.as_ref().map(|e| self.bind(e)).transpose()?.map(Box::new);
        Ok(Expr::Case(branches, else_))
    }

    fn bind_function(&self, func: &sql::Function) -> Result<Expr> {
        let name = func.name.0.last().map(|p| p.to_string()).unwrap_or_default();
        let args = function_args(func)?;
        let bound_args = args.iter().map(|a| self.bind(a)).collect::<Result<Vec<_>>>()?;
        let signature = self.functions.lookup(&name)?;
        Ok(Expr::Call(name.to_ascii_uppercase(), bound_args, signature.return_type.clone()))
    }

    fn bind_subscript_chain(&self, root: &sql::Expr, access_chain: &[sql::AccessExpr]) -> Result<Expr> {
        let mut bound = self.bind(root)?;
        for access in access_chain {
            bound = match access {
                sql::AccessExpr::Subscript(sql::Subscript::Index { index }) => {
                    Expr::Subscript(Box::new(bound), Box::new(self.bind(index)?), strata_expr::SubscriptMode::GetMember)
                }
                sql::AccessExpr::Dot(field) => {
                    Expr::Subscript(Box::new(bound), Box::new(Expr::lit(ScalarValue::Utf8(Some(field.to_string())))), strata_expr::SubscriptMode::GetMember)
                }
                other => return Err(StrataError::UnsupportedSyntax(format!("subscript form not supported: {other:?}"))),
            };
        }
        Ok(bound)
    }

    /// The logical type an already-bound `Expr` evaluates to, looking up
    /// `Column` types in `self.schema`.
    pub fn type_of(&self, expr: &Expr) -> LogicalType {
        match expr {
            Expr::Column(c) => self.schema.field(c.index).logical_type.clone(),
            Expr::Literal(_, ty) => ty.clone(),
            Expr::Call(_, _, ty) => ty.clone(),
            Expr::Cast(_, ty) => ty.clone(),
            Expr::Case(branches, else_) => branches.first().map(|b| self.type_of(&b.then)).or_else(|| else_.as_ref().map(|e| self.type_of(e))).unwrap_or(LogicalType::Varchar),
            Expr::Coalesce(args) => args.first().map(|a| self.type_of(a)).unwrap_or(LogicalType::Varchar),
            Expr::Subscript(_, _, _) => LogicalType::Varchar,
            Expr::And(_) | Expr::Or(_) | Expr::Not(_) | Expr::Compare(_, _, _) | Expr::Between(_, _, _) | Expr::InList(_, _, _) | Expr::IsNull(_, _) | Expr::Like(_, _, _, _) => LogicalType::Boolean,
            Expr::Arithmetic(op, l, _) if matches!(op, ArithmeticOp::Concat) => {
                let _ = l;
                LogicalType::Varchar
            }
            Expr::Arithmetic(ArithmeticOp::Divide, _, _) => LogicalType::Double,
            Expr::Arithmetic(_, l, r) => {
                let lt = self.type_of(l);
                let rt = self.type_of(r);
                common_type(&lt, &rt).unwrap_or(lt)
            }
            Expr::Alias(inner, _) => self.type_of(inner),
        }
    }
}

fn split_compound(parts: &[sql::Ident]) -> Result<(String, String)> {
    if parts.len() < 2 {
        return Err(StrataError::SqlError("compound identifier needs at least two parts".to_string()));
    }
    let name = parts.last().unwrap().value.clone();
    let qualifier = parts[..parts.len() - 1].iter().map(|p| p.value.as_str()).collect::<Vec<_>>().join(".");
    Ok((qualifier, name))
}

fn function_args(func: &sql::Function) -> Result<Vec<sql::Expr>> {
    match &func.args {
        sql::FunctionArguments::List(list) => list
            .args
            .iter()
            .map(|a| match a {
                sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(e)) => Ok(e.clone()),
                sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Wildcard) => Ok(sql::Expr::Value(sql::Value::Number("1".to_string(), false))),
                other => Err(StrataError::UnsupportedSyntax(format!("function argument not supported: {other:?}"))),
            })
            .collect(),
        sql::FunctionArguments::None => Ok(Vec::new()),
        sql::FunctionArguments::Subquery(_) => Err(StrataError::UnsupportedSyntax("function-call subquery arguments are not supported".to_string())),
    }
}

fn bind_data_type(data_type: &sql::DataType) -> Result<LogicalType> {
    use sql::DataType as DT;
    Ok(match data_type {
        DT::Boolean | DT::Bool => LogicalType::Boolean,
        DT::BigInt(_) | DT::Int(_) | DT::Integer(_) | DT::SmallInt(_) => LogicalType::Int64,
        DT::Double | DT::Float(_) | DT::Real => LogicalType::Double,
        DT::Decimal(info) => match info {
            sql::ExactNumberInfo::PrecisionAndScale(p, s) => LogicalType::Decimal(*p as u8, *s as i8),
            sql::ExactNumberInfo::Precision(p) => LogicalType::Decimal(*p as u8, 0),
            sql::ExactNumberInfo::None => LogicalType::Decimal(38, 10),
        },
        DT::Varchar(_) | DT::Char(_) | DT::Text | DT::String(_) => LogicalType::Varchar,
        DT::Blob(_) | DT::Binary(_) | DT::Varbinary(_) => LogicalType::Blob,
        DT::Date => LogicalType::Date,
        DT::Timestamp(_, _) | DT::Datetime(_) => LogicalType::Timestamp,
        other => return Err(StrataError::UnsupportedSyntax(format!("CAST target type not supported: {other}"))),
    })
}

//! `constant_fold_expression`/`constant_fold_reduce` (§4.3): the former
//! evaluates any subexpression that references no columns down to a
//! literal; the latter recognizes specific shapes that are provably
//! always-true or always-false without full evaluation.

use strata_common::{Result, ScalarValue};
use strata_expr::expr::Expr;
use strata_expr::{ArithmeticOp, LogicalPlan};
use strata_physical_expr::{compile, FunctionRegistry};
use strata_physical_plan::aggregate::accumulator::scalar_at;

use crate::rule::{ApplyOrder, OptimizerRule};
use crate::rules::expr_rewrite::{rewrite_bottom_up, rewrite_plan_exprs};

/// Evaluates a column-free expression with the compiled expression engine
/// against a schema-less, single-row batch, and wraps the result as a
/// literal.
fn fold_constant(expr: &Expr, registry: &FunctionRegistry) -> Result<Expr> {
    if matches!(expr, Expr::Literal(_, _)) || !expr.is_constant() {
        return Ok(expr.clone());
    }
    let empty_schema = strata_common::Schema::empty();
    let physical = compile(expr, &empty_schema, registry)?;
    let arrow_schema = std::sync::Arc::new(empty_schema.to_arrow());
    let options = arrow::record_batch::RecordBatchOptions::new().with_row_count(Some(1));
    let record = arrow::record_batch::RecordBatch::try_new_with_options(arrow_schema, vec![], &options)?;
    let batch = strata_common::Batch::new(std::sync::Arc::new(empty_schema), record);
    let value = match physical.evaluate(&batch)? {
        strata_physical_expr::ColumnarValue::Scalar(v) => v,
        strata_physical_expr::ColumnarValue::Array(a) => scalar_at(&a, 0)?,
    };
    Ok(Expr::lit(value))
}

pub struct ConstantFoldExpression {
    registry: FunctionRegistry,
}

impl ConstantFoldExpression {
    pub fn new() -> Self {
        Self { registry: FunctionRegistry::new() }
    }
}

impl Default for ConstantFoldExpression {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizerRule for ConstantFoldExpression {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let mut fold = |e: &Expr| rewrite_bottom_up(e, &mut |sub| fold_constant(&sub, &self.registry));
        let (new_plan, changed) = rewrite_plan_exprs(plan, &mut fold)?;
        Ok(if changed { Some(new_plan) } else { None })
    }

    fn name(&self) -> &str {
        "constant_fold_expression"
    }
}

fn reduce_shape(expr: &Expr) -> Expr {
    match expr {
        // `x * 0 = c` for any nonzero literal c is always false; null-handling
        // is irrelevant here because a null operand already makes the whole
        // comparison null, which a `Filter` treats as "drop the row" exactly
        // like `FALSE`.
        Expr::Compare(strata_expr::ComparisonOp::Eq, lhs, rhs) => {
            if is_zero_product(lhs) && !matches!(rhs.as_ref(), Expr::Literal(v, _) if v.is_null()) {
                if let Expr::Literal(ScalarValue::Int64(Some(c)), _) = rhs.as_ref() {
                    if *c != 0 {
                        return Expr::lit(ScalarValue::Boolean(Some(false)));
                    }
                }
            }
            expr.clone()
        }
        // `x LIKE '%'` with no escape semantics in play matches every
        // non-null string.
        Expr::Like(_, pattern, _, negated) => {
            if let Expr::Literal(ScalarValue::Utf8(Some(p)), _) = pattern.as_ref() {
                if p == "%" {
                    return Expr::lit(ScalarValue::Boolean(Some(!*negated)));
                }
            }
            expr.clone()
        }
        _ => expr.clone(),
    }
}

fn is_zero_product(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Arithmetic(ArithmeticOp::Multiply, _, rhs) if matches!(rhs.as_ref(), Expr::Literal(ScalarValue::Int64(Some(0)), _))
    ) || matches!(
        expr,
        Expr::Arithmetic(ArithmeticOp::Multiply, lhs, _) if matches!(lhs.as_ref(), Expr::Literal(ScalarValue::Int64(Some(0)), _))
    )
}

#[derive(Default)]
pub struct ConstantFoldReduce;

impl ConstantFoldReduce {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for ConstantFoldReduce {
    fn try_optimize(&self, plan: &LogicalPlan) -> Result<Option<LogicalPlan>> {
        let mut reduce = |e: &Expr| rewrite_bottom_up(e, &mut |sub| Ok(reduce_shape(&sub)));
        let (new_plan, changed) = rewrite_plan_exprs(plan, &mut reduce)?;
        Ok(if changed { Some(new_plan) } else { None })
    }

    fn name(&self) -> &str {
        "constant_fold_reduce"
    }

    fn apply_order(&self) -> ApplyOrder {
        ApplyOrder::BottomUp
    }
}

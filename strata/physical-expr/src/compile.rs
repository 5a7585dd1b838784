//! Lowers a bound `strata_expr::Expr` tree into a `PhysicalExprRef` tree,
//! resolving function calls against a `FunctionRegistry` once so evaluation
//! never re-dispatches on node kind or re-looks-up a function per batch.

use std::sync::Arc;
use strata_common::{internal_error, LogicalType, Result, ScalarValue, Schema};
use strata_expr::{CaseBranch, Expr};

use crate::expressions::*;
use crate::functions::FunctionRegistry;
use crate::physical_expr::PhysicalExprRef;

/// `schema` is the already-bound input schema (for a join, the concatenated
/// left/right schema) — `Expr::Column` carries only a flat index into it, not
/// its own type, so that type must be looked up here rather than stored on
/// every column reference.
pub fn compile(expr: &Expr, schema: &Schema, registry: &FunctionRegistry) -> Result<PhysicalExprRef> {
    Ok(match expr {
        Expr::Column(c) => {
            let logical_type = schema.field(c.index).logical_type.clone();
            Arc::new(ColumnExpr::new(c.index, logical_type))
        }
        Expr::Literal(value, ty) => Arc::new(LiteralExpr::new(value.clone(), ty.clone())),
        Expr::Call(name, args, return_type) => compile_call(name, args, return_type.clone(), schema, registry)?,
        Expr::Cast(inner, to) => Arc::new(CastExpr::new(compile(inner, schema, registry)?, to.clone())),
        Expr::Case(branches, else_) => compile_case(branches, else_.as_deref(), schema, registry)?,
        Expr::Coalesce(args) => compile_coalesce(args, schema, registry)?,
        Expr::Subscript(container, key, mode) => compile_subscript(container, key, *mode, schema, registry)?,
        Expr::And(args) => Arc::new(AndExpr::new(compile_all(args, schema, registry)?)),
        Expr::Or(args) => Arc::new(OrExpr::new(compile_all(args, schema, registry)?)),
        Expr::Not(inner) => Arc::new(NotExpr::new(compile(inner, schema, registry)?)),
        Expr::Compare(op, l, r) => {
            Arc::new(CompareExpr::new(*op, compile(l, schema, registry)?, compile(r, schema, registry)?))
        }
        Expr::Arithmetic(op, l, r) => Arc::new(ArithmeticExpr::new(
            *op,
            compile(l, schema, registry)?,
            compile(r, schema, registry)?,
        )?),
        Expr::Between(value, lo, hi) => Arc::new(BetweenExpr::new(
            compile(value, schema, registry)?,
            compile(lo, schema, registry)?,
            compile(hi, schema, registry)?,
        )),
        Expr::InList(value, list, negated) => Arc::new(InListExpr::new(
            compile(value, schema, registry)?,
            compile_all(list, schema, registry)?,
            *negated,
        )),
        Expr::IsNull(inner, negated) => Arc::new(IsNullExpr::new(compile(inner, schema, registry)?, *negated)),
        Expr::Like(input, pattern, negated, case_insensitive) => Arc::new(LikeExpr::new(
            compile(input, schema, registry)?,
            compile(pattern, schema, registry)?,
            *negated,
            *case_insensitive,
        )),
        Expr::Alias(inner, name) => Arc::new(AliasExpr::new(compile(inner, schema, registry)?, name.clone())),
    })
}

fn compile_all(exprs: &[Expr], schema: &Schema, registry: &FunctionRegistry) -> Result<Vec<PhysicalExprRef>> {
    exprs.iter().map(|e| compile(e, schema, registry)).collect()
}

fn compile_call(
    name: &str,
    args: &[Expr],
    return_type: LogicalType,
    schema: &Schema,
    registry: &FunctionRegistry,
) -> Result<PhysicalExprRef> {
    // IFNULL/IFNOTNULL are two-argument sugar for COALESCE — compiled
    // straight to it rather than registered as their own function, since the
    // semantics (and null-handling exception in §4.6) are identical.
    match name.to_ascii_uppercase().as_str() {
        "IFNULL" if args.len() == 2 => return compile_coalesce(args, schema, registry),
        "IFNOTNULL" if args.len() == 2 => {
            let condition = Expr::IsNull(Box::new(args[0].clone()), true);
            return Ok(Arc::new(CaseExpr::new(
                vec![CaseWhenThen {
                    when: compile(&condition, schema, registry)?,
                    then: compile(&args[0], schema, registry)?,
                }],
                Some(compile(&args[1], schema, registry)?),
                return_type,
            )));
        }
        _ => {}
    }
    let signature = registry.lookup(name)?;
    let compiled_args = compile_all(args, schema, registry)?;
    Ok(Arc::new(CallExpr::new(
        name.to_string(),
        compiled_args,
        signature.implementation.clone(),
        signature.return_type.clone(),
    )))
}

fn compile_case(
    branches: &[CaseBranch],
    else_: Option<&Expr>,
    schema: &Schema,
    registry: &FunctionRegistry,
) -> Result<PhysicalExprRef> {
    let compiled_branches = branches
        .iter()
        .map(|b| {
            Ok(CaseWhenThen {
                when: compile(&b.when, schema, registry)?,
                then: compile(&b.then, schema, registry)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let compiled_else = else_.map(|e| compile(e, schema, registry)).transpose()?;
    let logical_type = compiled_branches
        .first()
        .map(|b| b.then.logical_type())
        .or_else(|| compiled_else.as_ref().map(|e| e.logical_type()))
        .ok_or_else(|| internal_error("CASE expression has no branches and no ELSE"))?;
    Ok(Arc::new(CaseExpr::new(compiled_branches, compiled_else, logical_type)))
}

fn compile_coalesce(args: &[Expr], schema: &Schema, registry: &FunctionRegistry) -> Result<PhysicalExprRef> {
    let compiled = compile_all(args, schema, registry)?;
    let logical_type = compiled
        .first()
        .map(|e| e.logical_type())
        .ok_or_else(|| internal_error("COALESCE requires at least one argument"))?;
    Ok(Arc::new(CoalesceExpr::new(compiled, logical_type)))
}

fn compile_subscript(
    container: &Expr,
    key: &Expr,
    mode: strata_expr::SubscriptMode,
    schema: &Schema,
    registry: &FunctionRegistry,
) -> Result<PhysicalExprRef> {
    let key_name = match key {
        Expr::Literal(ScalarValue::Utf8(Some(k)), _) => k.clone(),
        _ => return Err(internal_error("subscript key must be a string literal")),
    };
    let compiled_container = compile(container, schema, registry)?;
    let member_type = match compiled_container.logical_type() {
        LogicalType::Struct(fields) => fields
            .iter()
            .find(|f| f.name == key_name)
            .map(|f| f.logical_type.clone())
            .ok_or_else(|| internal_error(format!("struct has no field named {key_name}")))?,
        other => return Err(internal_error(format!("subscript base is not STRUCT (got {other})"))),
    };
    Ok(Arc::new(SubscriptExpr::new(compiled_container, key_name, mode, member_type)))
}

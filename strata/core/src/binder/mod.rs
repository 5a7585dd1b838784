//! The top-level query binder (§4.1, §6.1): turns parsed SQL into a bound
//! `LogicalPlan` with every identifier resolved to a `ColumnRef` and every
//! dataset reference checked against the catalog and the permissions gate.
//! Grounded loosely on `datafusion-sql`'s `SqlToRel` for the overall
//! recursive-descent shape (`bind_query` → `bind_select` → `bind_from` →
//! `bind_table_with_joins`), adapted throughout since that teacher resolves
//! by name against a `DFSchema` while this binder resolves straight to an
//! index (invariant 2) and has no separate logical-optimization pass of its
//! own — that's `strata-optimizer`'s job.

pub mod coercion;
pub mod expr;
pub mod scope;

use sqlparser::ast as sql;

use strata_common::{Field, LogicalType, Result, Schema, ScalarValue, StrataError};
use strata_expr::{
    AggregateExpr, ComparisonOp, DatasetRef, Expr, Hints, JoinType, LogicalPlan, SortDirection, SortExpr,
    TemporalSelector,
};
use strata_physical_expr::FunctionRegistry;

use crate::catalog::Catalog;
use crate::permissions::Permissions;
use crate::temporal;

use self::expr::ExprBinder;
use self::scope::Scope;

/// Binds one SQL statement at a time against a fixed catalog, permissions
/// gate and role set. A `Binder` is cheap to construct and holds no state
/// across calls to `bind_sql`.
pub struct Binder<'a> {
    catalog: &'a Catalog,
    permissions: &'a Permissions,
    roles: &'a [String],
    functions: FunctionRegistry,
    today: chrono::NaiveDate,
}

impl<'a> Binder<'a> {
    pub fn new(catalog: &'a Catalog, permissions: &'a Permissions, roles: &'a [String], today: chrono::NaiveDate) -> Self {
        Self { catalog, permissions, roles, functions: FunctionRegistry::new(), today }
    }

    /// Binds a single SQL statement. Any `FOR <when>` clause is extracted
    /// and resolved first (§9) so the remaining text reaches the parser
    /// clean; the resolved selector is then attached to every `Scan` node
    /// the statement produces.
    pub fn bind_sql(&self, sql_text: &str) -> Result<LogicalPlan> {
        let (selector, cleaned) = temporal::extract_and_resolve(sql_text, self.today)?;
        let temporal = selector.map(convert_temporal_selector);

        let dialect = sqlparser::dialect::GenericDialect {};
        let mut statements =
            sqlparser::parser::Parser::parse_sql(&dialect, &cleaned).map_err(|e| StrataError::SqlError(e.to_string()))?;
        if statements.is_empty() {
            return Err(StrataError::MissingSqlStatement);
        }
        if statements.len() > 1 {
            return Err(StrataError::SqlError("only a single SQL statement is supported per call".to_string()));
        }
        match statements.remove(0) {
            sql::Statement::Query(query) => self.bind_query(&query, temporal.as_ref()),
            other => Err(StrataError::UnsupportedSyntax(format!("statement not supported: {other}"))),
        }
    }

    fn bind_query(&self, query: &sql::Query, temporal: Option<&TemporalSelector>) -> Result<LogicalPlan> {
        let (mut plan, scope) = match query.body.as_ref() {
            sql::SetExpr::Select(select) => self.bind_select(select, temporal)?,
            sql::SetExpr::Query(inner) => return self.bind_query(inner, temporal),
            other => return Err(StrataError::UnsupportedSyntax(format!("query form not supported: {other}"))),
        };

        if let Some(order_by) = &query.order_by {
            let schema = plan.schema();
            let binder = ExprBinder { scope: &scope, schema: &schema, functions: &self.functions };
            let exprs = order_by
                .exprs
                .iter()
                .map(|o| {
                    Ok(SortExpr {
                        expr: binder.bind(&o.expr)?,
                        direction: if o.asc.unwrap_or(true) { SortDirection::Asc } else { SortDirection::Desc },
                        nulls_first: o.nulls_first.unwrap_or(false),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if !exprs.is_empty() {
                plan = LogicalPlan::Sort { input: Box::new(plan), exprs };
            }
        }

        if query.limit.is_some() || query.offset.is_some() {
            let limit = query.limit.as_ref().map(literal_usize).transpose()?;
            let offset = query.offset.as_ref().map(|o| literal_usize(&o.value)).transpose()?.unwrap_or(0);
            plan = LogicalPlan::Limit { input: Box::new(plan), limit, offset };
        }

        Ok(plan)
    }

    fn bind_select(&self, select: &sql::Select, temporal: Option<&TemporalSelector>) -> Result<(LogicalPlan, Scope)> {
        let (mut plan, mut scope) = if select.from.is_empty() {
            (LogicalPlan::Values { rows: vec![vec![]], schema: Schema::empty() }, Scope::empty())
        } else {
            self.bind_from(&select.from, temporal)?
        };

        if let Some(selection) = &select.selection {
            let schema = plan.schema();
            let binder = ExprBinder { scope: &scope, schema: &schema, functions: &self.functions };
            let predicate = binder.bind(selection)?;
            plan = LogicalPlan::Filter { input: Box::new(plan), predicate };
        }

        let group_by_sql = extract_group_by(&select.group_by)?;
        let aggregating = !group_by_sql.is_empty() || select.projection.iter().any(projection_item_has_aggregate);

        if aggregating {
            let (agg_node, agg_schema, proj_exprs, proj_schema) = self.bind_aggregate(plan, &scope, &group_by_sql, &select.projection)?;
            let mut node = agg_node;
            if let Some(having) = &select.having {
                let agg_scope = Scope::from_schema("", &agg_schema);
                let binder = ExprBinder { scope: &agg_scope, schema: &agg_schema, functions: &self.functions };
                let predicate = binder.bind(having)?;
                node = LogicalPlan::Filter { input: Box::new(node), predicate };
            }
            plan = LogicalPlan::Project { input: Box::new(node), exprs: proj_exprs, schema: proj_schema.clone(), hints: Hints::new() };
            scope = Scope::from_schema("", &proj_schema);
        } else {
            let (exprs, proj_schema, proj_scope) = self.bind_projection(&select.projection, &scope, &plan.schema())?;
            plan = LogicalPlan::Project { input: Box::new(plan), exprs, schema: proj_schema, hints: Hints::new() };
            scope = proj_scope;
        }

        match &select.distinct {
            None => {}
            Some(sql::Distinct::Distinct) => plan = LogicalPlan::Distinct { input: Box::new(plan) },
            Some(sql::Distinct::On(_)) => return Err(StrataError::UnsupportedSyntax("DISTINCT ON is not supported".to_string())),
        }

        Ok((plan, scope))
    }

    fn bind_projection(&self, projection: &[sql::SelectItem], scope: &Scope, schema: &Schema) -> Result<(Vec<Expr>, Schema, Scope)> {
        let binder = ExprBinder { scope, schema, functions: &self.functions };
        let mut exprs = Vec::new();
        let mut fields = Vec::new();

        for item in projection {
            match item {
                sql::SelectItem::UnnamedExpr(e) => {
                    let bound = binder.bind(e)?;
                    let ty = binder.type_of(&bound);
                    fields.push(Field::new(column_display_name(e), ty, true));
                    exprs.push(bound);
                }
                sql::SelectItem::ExprWithAlias { expr, alias } => {
                    let bound = binder.bind(expr)?;
                    let ty = binder.type_of(&bound);
                    fields.push(Field::new(alias.value.clone(), ty, true));
                    exprs.push(Expr::Alias(Box::new(bound), alias.value.clone()));
                }
                sql::SelectItem::Wildcard(_) => {
                    for i in 0..schema.len() {
                        exprs.push(Expr::column(i));
                        fields.push(schema.field(i).clone());
                    }
                }
                sql::SelectItem::QualifiedWildcard(kind, _) => {
                    let qualifier = qualified_wildcard_name(kind)?;
                    for i in 0..scope.len() {
                        if scope.qualifier_at(i) == qualifier {
                            exprs.push(Expr::column(i));
                            fields.push(schema.field(i).clone());
                        }
                    }
                }
            }
        }

        let out_schema = Schema::new(fields);
        let out_scope = Scope::from_schema("", &out_schema);
        Ok((exprs, out_schema, out_scope))
    }

    /// Binds `GROUP BY`/aggregate SELECT items. Each projection item must be
    /// either a bare aggregate call (`SUM(x)`, `COUNT(*)`, ...) or a bare
    /// column that also appears in `GROUP BY`; arbitrary expressions mixing
    /// the two (`SUM(x) + 1`) are out of scope for now and raise
    /// `UnsupportedSyntax`. Returns the `Aggregate` node, its own schema (for
    /// binding `HAVING` against), and the final projection that reorders and
    /// renames its columns to match the SELECT list.
    fn bind_aggregate(
        &self,
        input: LogicalPlan,
        input_scope: &Scope,
        group_by_sql: &[sql::Expr],
        projection: &[sql::SelectItem],
    ) -> Result<(LogicalPlan, Schema, Vec<Expr>, Schema)> {
        let input_schema = input.schema();
        let binder = ExprBinder { scope: input_scope, schema: &input_schema, functions: &self.functions };

        let group_exprs: Vec<Expr> = group_by_sql.iter().map(|e| binder.bind(e)).collect::<Result<_>>()?;
        let group_keys: Vec<String> = group_exprs.iter().map(|e| format!("{e:?}")).collect();
        let group_fields: Vec<Field> =
            group_exprs.iter().enumerate().map(|(i, e)| Field::new(format!("group_{i}"), binder.type_of(e), true)).collect();

        let mut aggregates: Vec<AggregateExpr> = Vec::new();
        let mut agg_fields: Vec<Field> = Vec::new();
        let mut proj_exprs = Vec::with_capacity(projection.len());
        let mut proj_fields = Vec::with_capacity(projection.len());

        for item in projection {
            let (item_expr, explicit_alias) = match item {
                sql::SelectItem::UnnamedExpr(e) => (e, None),
                sql::SelectItem::ExprWithAlias { expr, alias } => (expr, Some(alias.value.clone())),
                other => return Err(StrataError::UnsupportedSyntax(format!("SELECT item not supported in an aggregate query: {other:?}"))),
            };

            if let sql::Expr::Function(func) = item_expr {
                let name = func.name.0.last().map(|p| p.value.to_ascii_uppercase()).unwrap_or_default();
                if is_aggregate_name(&name) {
                    let (arg, distinct, limit, is_wildcard) = aggregate_call_parts(func)?;
                    let bound_arg = arg.map(|a| binder.bind(&a)).transpose()?;
                    let arg_type = bound_arg.as_ref().map(|a| binder.type_of(a));
                    let output_type = aggregate_output_type(&name, arg_type.clone());
                    let function_name = if name == "COUNT" && is_wildcard { "COUNT_STAR".to_string() } else { name.clone() };
                    let alias = explicit_alias.unwrap_or_else(|| format!("{}_{}", function_name.to_ascii_lowercase(), aggregates.len()));

                    let out_idx = group_exprs.len() + aggregates.len();
                    proj_exprs.push(Expr::Alias(Box::new(Expr::column(out_idx)), alias.clone()));
                    proj_fields.push(Field::new(alias.clone(), output_type.clone(), true));

                    agg_fields.push(Field::new(alias.clone(), output_type, true));
                    aggregates.push(AggregateExpr { function: function_name, arg: bound_arg, distinct, limit, alias });
                    continue;
                }
            }

            let bound = binder.bind(item_expr)?;
            let key = format!("{bound:?}");
            let group_idx = group_keys
                .iter()
                .position(|g| *g == key)
                .ok_or_else(|| StrataError::UnsupportedSyntax("a non-aggregate SELECT item must be a GROUP BY column".to_string()))?;
            let name = explicit_alias.unwrap_or_else(|| column_display_name(item_expr));
            proj_exprs.push(Expr::Alias(Box::new(Expr::column(group_idx)), name.clone()));
            proj_fields.push(Field::new(name, group_fields[group_idx].logical_type.clone(), true));
        }

        let agg_schema = Schema::new(group_fields.into_iter().chain(agg_fields).collect());
        let agg_node = LogicalPlan::Aggregate { input: Box::new(input), group_by: group_exprs, aggregates, schema: agg_schema.clone() };
        let proj_schema = Schema::new(proj_fields);
        Ok((agg_node, agg_schema, proj_exprs, proj_schema))
    }

    fn bind_from(&self, from: &[sql::TableWithJoins], temporal: Option<&TemporalSelector>) -> Result<(LogicalPlan, Scope)> {
        let mut iter = from.iter();
        let first = iter.next().expect("caller checked from is non-empty");
        let (mut plan, mut scope) = self.bind_table_with_joins(first, temporal)?;
        for twj in iter {
            let (rplan, rscope) = self.bind_table_with_joins(twj, temporal)?;
            let schema = plan.schema().join(&rplan.schema());
            plan = LogicalPlan::CrossJoin { left: Box::new(plan), right: Box::new(rplan), schema };
            scope = scope.concat(rscope);
        }
        Ok((plan, scope))
    }

    fn bind_table_with_joins(&self, twj: &sql::TableWithJoins, temporal: Option<&TemporalSelector>) -> Result<(LogicalPlan, Scope)> {
        let (mut plan, mut scope) = self.bind_table_factor(&twj.relation, temporal)?;
        for join in &twj.joins {
            let (rplan, rscope) = self.bind_table_factor(&join.relation, temporal)?;
            let left_len = scope.len();
            let combined_schema = plan.schema().join(&rplan.schema());
            let combined_scope = scope.clone().concat(rscope.clone());

            if let sql::JoinOperator::CrossJoin = &join.join_operator {
                plan = LogicalPlan::CrossJoin { left: Box::new(plan), right: Box::new(rplan), schema: combined_schema };
                scope = combined_scope;
                continue;
            }

            let (join_type, constraint) = split_join_operator(&join.join_operator)?;
            let (on, filter) = self.bind_join_constraint(constraint, &scope, &rscope, &combined_scope, &combined_schema, left_len)?;
            plan = LogicalPlan::Join { left: Box::new(plan), right: Box::new(rplan), join_type, on, filter, schema: combined_schema };
            scope = combined_scope;
        }
        Ok((plan, scope))
    }

    fn bind_join_constraint(
        &self,
        constraint: &sql::JoinConstraint,
        left_scope: &Scope,
        right_scope: &Scope,
        combined_scope: &Scope,
        combined_schema: &Schema,
        left_len: usize,
    ) -> Result<(Vec<(Expr, Expr)>, Option<Expr>)> {
        match constraint {
            sql::JoinConstraint::On(predicate) => {
                let binder = ExprBinder { scope: combined_scope, schema: combined_schema, functions: &self.functions };
                let bound = binder.bind(predicate)?;
                let mut on = Vec::new();
                let mut residual = Vec::new();
                for conjunct in flatten_and(bound) {
                    if let Expr::Compare(ComparisonOp::Eq, l, r) = &conjunct {
                        let l_refs = l.column_refs();
                        let r_refs = r.column_refs();
                        let l_is_left = !l_refs.is_empty() && l_refs.iter().all(|c| c.index < left_len);
                        let r_is_right = !r_refs.is_empty() && r_refs.iter().all(|c| c.index >= left_len);
                        if l_is_left && r_is_right {
                            on.push(((**l).clone(), shift_down(r, left_len)));
                            continue;
                        }
                        let l_is_right = !l_refs.is_empty() && l_refs.iter().all(|c| c.index >= left_len);
                        let r_is_left = !r_refs.is_empty() && r_refs.iter().all(|c| c.index < left_len);
                        if l_is_right && r_is_left {
                            on.push(((**r).clone(), shift_down(l, left_len)));
                            continue;
                        }
                    }
                    residual.push(conjunct);
                }
                Ok((on, combine_and(residual)))
            }
            sql::JoinConstraint::Using(idents) => {
                let mut on = Vec::new();
                for ident in idents {
                    let l = left_scope.resolve(None, &ident.value)?;
                    let r = right_scope.resolve(None, &ident.value)?;
                    on.push((Expr::Column(l), Expr::Column(r)));
                }
                Ok((on, None))
            }
            sql::JoinConstraint::Natural => Err(StrataError::UnsupportedSyntax("NATURAL JOIN is not supported".to_string())),
            sql::JoinConstraint::None => Ok((Vec::new(), None)),
        }
    }

    fn bind_table_factor(&self, factor: &sql::TableFactor, temporal: Option<&TemporalSelector>) -> Result<(LogicalPlan, Scope)> {
        match factor {
            sql::TableFactor::Table { name, alias, .. } => {
                let dataset_name = object_name_to_string(name);
                self.permissions.check_read(self.roles, &dataset_name)?;
                let resolved = self.catalog.resolve(&dataset_name)?;
                let schema = resolved.connector.get_schema()?;
                let statistics = resolved.connector.get_statistics()?;
                let alias_name = alias.as_ref().map(|a| a.name.value.clone()).unwrap_or_else(|| dataset_name.clone());

                let dataset = DatasetRef {
                    connector_key: resolved.connector_key,
                    inner_name: resolved.inner_name,
                    alias: alias_name.clone(),
                    temporal: temporal.cloned(),
                };
                let plan = LogicalPlan::Scan {
                    dataset,
                    schema: schema.clone(),
                    statistics,
                    projection: None,
                    filters: Vec::new(),
                    limit: None,
                    hints: Hints::new(),
                };
                let scope = Scope::from_schema(&alias_name, &schema);
                Ok((plan, scope))
            }
            sql::TableFactor::Derived { subquery, alias, .. } => {
                let plan = self.bind_query(subquery, temporal)?;
                let alias_name = alias.as_ref().map(|a| a.name.value.clone()).unwrap_or_else(|| "subquery".to_string());
                let scope = Scope::from_schema(&alias_name, &plan.schema());
                Ok((plan, scope))
            }
            sql::TableFactor::NestedJoin { table_with_joins, alias } => {
                let (plan, scope) = self.bind_table_with_joins(table_with_joins, temporal)?;
                match alias {
                    Some(a) => {
                        let renamed = Scope::from_schema(&a.name.value, &plan.schema());
                        Ok((plan, renamed))
                    }
                    None => Ok((plan, scope)),
                }
            }
            sql::TableFactor::UNNEST { alias, array_exprs, .. } => self.bind_unnest(array_exprs, alias),
            other => Err(StrataError::UnsupportedSyntax(format!("FROM clause item not supported: {other}"))),
        }
    }

    /// `UNNEST(('a', 'b', 'c')) AS x` (§8.4): supported only over a literal
    /// tuple of values, which is the only form this engine's test scenarios
    /// exercise. Lowered to a one-row, one-column `Values` holding the array
    /// literal, fed into a `LogicalPlan::Unnest`, then projected down to just
    /// the exploded column — `CrossJoinUnnestOperator` appends the exploded
    /// column after its input's own columns, so the `Values` row's array
    /// column has to be dropped afterwards.
    fn bind_unnest(&self, array_exprs: &[sql::Expr], alias: &Option<sql::TableAlias>) -> Result<(LogicalPlan, Scope)> {
        let source = array_exprs
            .first()
            .ok_or_else(|| StrataError::UnsupportedSyntax("UNNEST requires one array expression".to_string()))?;
        let elements: &Vec<sql::Expr> = match source {
            sql::Expr::Tuple(items) => items,
            other => return Err(StrataError::UnsupportedSyntax(format!("UNNEST is only supported over a literal list, not `{other}`"))),
        };

        let empty_scope = Scope::empty();
        let empty_schema = Schema::empty();
        let binder = ExprBinder { scope: &empty_scope, schema: &empty_schema, functions: &self.functions };
        let mut values = Vec::with_capacity(elements.len());
        for item in elements {
            match binder.bind(item)? {
                Expr::Literal(scalar, _) => values.push(scalar),
                _ => return Err(StrataError::UnsupportedSyntax("UNNEST elements must be literals".to_string())),
            }
        }

        let elem_type = values.first().map(|v| v.logical_type()).unwrap_or(LogicalType::Varchar);
        let alias_name = alias.as_ref().map(|a| a.name.value.clone()).unwrap_or_else(|| "unnest".to_string());

        let source_schema = Schema::new(vec![Field::new("__unnest_source", LogicalType::Array(Box::new(elem_type.clone())), true)]);
        let source_literal = Expr::lit(ScalarValue::Array(values, elem_type.clone()));
        let values_plan = LogicalPlan::Values { rows: vec![vec![source_literal]], schema: source_schema.clone() };

        let unnest_schema = source_schema.join(&Schema::new(vec![Field::new(alias_name.clone(), elem_type.clone(), true)]));
        let unnest_plan =
            LogicalPlan::Unnest { input: Box::new(values_plan), expr: Expr::column(0), alias: alias_name.clone(), schema: unnest_schema };

        let final_schema = Schema::new(vec![Field::new(alias_name.clone(), elem_type, true)]);
        let plan = LogicalPlan::Project {
            input: Box::new(unnest_plan),
            exprs: vec![Expr::column(1)],
            schema: final_schema.clone(),
            hints: Hints::new(),
        };
        let scope = Scope::from_schema(&alias_name, &final_schema);
        Ok((plan, scope))
    }
}

fn convert_temporal_selector(selector: strata_connectors::TemporalSelector) -> TemporalSelector {
    match selector {
        strata_connectors::TemporalSelector::DateRange(r) => TemporalSelector::DateRange { start: r.start, end: r.end },
        strata_connectors::TemporalSelector::Snapshot(at) => TemporalSelector::Snapshot(at),
    }
}

fn split_join_operator(op: &sql::JoinOperator) -> Result<(JoinType, &sql::JoinConstraint)> {
    use sql::JoinOperator as J;
    match op {
        J::Inner(c) => Ok((JoinType::Inner, c)),
        J::LeftOuter(c) => Ok((JoinType::Left, c)),
        J::RightOuter(c) => Ok((JoinType::Right, c)),
        J::FullOuter(c) => Ok((JoinType::Full, c)),
        other => Err(StrataError::UnsupportedSyntax(format!("join type not supported: {other:?}"))),
    }
}

/// Rewrites every `Column` index in `expr` down by `offset` — the inverse of
/// how `physical_planner.rs`'s join lowering shifts a right-side key back up
/// to the combined schema, reimplemented here since that helper is private
/// to the optimizer crate.
fn shift_down(expr: &Expr, offset: usize) -> Expr {
    match expr {
        Expr::Column(c) => Expr::Column(strata_expr::ColumnRef { source: c.source, index: c.index - offset }),
        other => {
            let children = other.children().iter().map(|c| shift_down(c, offset)).collect();
            other.with_new_children(children)
        }
    }
}

fn flatten_and(expr: Expr) -> Vec<Expr> {
    match expr {
        Expr::And(args) => args.into_iter().flat_map(flatten_and).collect(),
        other => vec![other],
    }
}

fn combine_and(mut exprs: Vec<Expr>) -> Option<Expr> {
    match exprs.len() {
        0 => None,
        1 => Some(exprs.remove(0)),
        _ => Some(Expr::And(exprs)),
    }
}

fn object_name_to_string(name: &sql::ObjectName) -> String {
    name.0.iter().map(|p| p.value.as_str()).collect::<Vec<_>>().join(".")
}

fn column_display_name(expr: &sql::Expr) -> String {
    match expr {
        sql::Expr::Identifier(ident) => ident.value.clone(),
        sql::Expr::CompoundIdentifier(parts) => parts.last().map(|p| p.value.clone()).unwrap_or_else(|| "expr".to_string()),
        _ => "expr".to_string(),
    }
}

fn qualified_wildcard_name(kind: &sql::SelectItemQualifiedWildcardKind) -> Result<String> {
    match kind {
        sql::SelectItemQualifiedWildcardKind::ObjectName(name) => Ok(object_name_to_string(name)),
        other => Err(StrataError::UnsupportedSyntax(format!("qualified wildcard form not supported: {other:?}"))),
    }
}

fn extract_group_by(group_by: &sql::GroupByExpr) -> Result<Vec<sql::Expr>> {
    match group_by {
        sql::GroupByExpr::Expressions(exprs, _) => Ok(exprs.clone()),
        sql::GroupByExpr::All(_) => Err(StrataError::UnsupportedSyntax("GROUP BY ALL is not supported".to_string())),
    }
}

fn literal_usize(expr: &sql::Expr) -> Result<usize> {
    match expr {
        sql::Expr::Value(sql::Value::Number(n, _)) => n.parse::<usize>().map_err(|_| StrataError::SqlError(format!("not an integer: {n}"))),
        other => Err(StrataError::UnsupportedSyntax(format!("LIMIT/OFFSET must be an integer literal, not `{other}`"))),
    }
}

fn projection_item_has_aggregate(item: &sql::SelectItem) -> bool {
    match item {
        sql::SelectItem::UnnamedExpr(e) | sql::SelectItem::ExprWithAlias { expr: e, .. } => expr_has_aggregate(e),
        _ => false,
    }
}

fn expr_has_aggregate(expr: &sql::Expr) -> bool {
    match expr {
        sql::Expr::Function(func) => {
            let name = func.name.0.last().map(|p| p.value.to_ascii_uppercase()).unwrap_or_default();
            is_aggregate_name(&name)
        }
        sql::Expr::BinaryOp { left, right, .. } => expr_has_aggregate(left) || expr_has_aggregate(right),
        sql::Expr::UnaryOp { expr, .. } | sql::Expr::Nested(expr) | sql::Expr::Cast { expr, .. } => expr_has_aggregate(expr),
        _ => false,
    }
}

fn is_aggregate_name(name: &str) -> bool {
    matches!(
        name,
        "COUNT"
            | "SUM"
            | "MIN"
            | "MAX"
            | "AVG"
            | "ARRAY_AGG"
            | "STDDEV"
            | "STDDEV_SAMP"
            | "STDDEV_POP"
            | "VARIANCE"
            | "VAR_SAMP"
            | "VAR_POP"
            | "ANY_VALUE"
            | "APPROXIMATE_MEDIAN"
            | "APPROX_MEDIAN"
    )
}

/// `(argument, distinct, limit, is_wildcard)`. `limit` (`ARRAY_AGG(... LIMIT
/// n)`) is not threaded through yet — every call binds as unlimited.
fn aggregate_call_parts(func: &sql::Function) -> Result<(Option<sql::Expr>, bool, Option<usize>, bool)> {
    match &func.args {
        sql::FunctionArguments::List(list) => {
            let distinct = matches!(list.duplicate_treatment, Some(sql::DuplicateTreatment::Distinct));
            let mut arg = None;
            let mut is_wildcard = false;
            for a in &list.args {
                match a {
                    sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(e)) => arg = Some(e.clone()),
                    sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Wildcard) => is_wildcard = true,
                    other => return Err(StrataError::UnsupportedSyntax(format!("aggregate argument not supported: {other:?}"))),
                }
            }
            Ok((arg, distinct, None, is_wildcard))
        }
        sql::FunctionArguments::None => Ok((None, false, None, true)),
        sql::FunctionArguments::Subquery(_) => Err(StrataError::UnsupportedSyntax("aggregate with subquery arguments is not supported".to_string())),
    }
}

fn aggregate_output_type(name: &str, arg_type: Option<LogicalType>) -> LogicalType {
    match name {
        "COUNT" => LogicalType::Int64,
        "SUM" | "MIN" | "MAX" | "ANY_VALUE" => arg_type.unwrap_or(LogicalType::Int64),
        "AVG" | "STDDEV" | "STDDEV_SAMP" | "STDDEV_POP" | "VARIANCE" | "VAR_SAMP" | "VAR_POP" | "APPROXIMATE_MEDIAN" | "APPROX_MEDIAN" => {
            LogicalType::Double
        }
        "ARRAY_AGG" => LogicalType::Array(Box::new(arg_type.unwrap_or(LogicalType::Varchar))),
        _ => arg_type.unwrap_or(LogicalType::Varchar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::permissions::Permissions;
    use strata_common::Batch;

    fn binder<'a>(catalog: &'a Catalog, permissions: &'a Permissions, roles: &'a [String]) -> Binder<'a> {
        Binder::new(catalog, permissions, roles, chrono::NaiveDate::from_ymd_opt(2026, 7, 27).unwrap())
    }

    fn sample_catalog() -> Catalog {
        let catalog = Catalog::new();
        let schema = Schema::new(vec![
            Field::new("id", LogicalType::Int64, false),
            Field::new("name", LogicalType::Varchar, false),
        ]);
        catalog.register_arrow("widgets", schema, Vec::<Batch>::new());
        catalog
    }

    #[test]
    fn binds_a_plain_projection_and_filter() {
        let catalog = sample_catalog();
        let perms = Permissions::default();
        let roles = vec!["opteryx".to_string()];
        let b = binder(&catalog, &perms, &roles);
        let plan = b.bind_sql("SELECT id, name FROM widgets WHERE id > 1").unwrap();
        assert_eq!(plan.schema().len(), 2);
        assert!(matches!(plan, LogicalPlan::Project { .. }));
    }

    #[test]
    fn binds_a_wildcard_projection() {
        let catalog = sample_catalog();
        let perms = Permissions::default();
        let roles = vec!["opteryx".to_string()];
        let b = binder(&catalog, &perms, &roles);
        let plan = b.bind_sql("SELECT * FROM widgets").unwrap();
        assert_eq!(plan.schema().len(), 2);
    }

    #[test]
    fn unreadable_dataset_is_a_permissions_error() {
        let catalog = sample_catalog();
        let perms = Permissions::new(vec![]);
        let roles = vec!["analyst".to_string()];
        let b = binder(&catalog, &perms, &roles);
        let err = b.bind_sql("SELECT * FROM widgets").unwrap_err();
        assert!(matches!(err, StrataError::PermissionsError(_)));
    }

    #[test]
    fn unknown_dataset_is_not_found() {
        let catalog = sample_catalog();
        let perms = Permissions::default();
        let roles = vec!["opteryx".to_string()];
        let b = binder(&catalog, &perms, &roles);
        let err = b.bind_sql("SELECT * FROM nope").unwrap_err();
        assert!(matches!(err, StrataError::DatasetNotFound(_)));
    }

    #[test]
    fn binds_a_group_by_aggregate() {
        let catalog = sample_catalog();
        let perms = Permissions::default();
        let roles = vec!["opteryx".to_string()];
        let b = binder(&catalog, &perms, &roles);
        let plan = b.bind_sql("SELECT name, COUNT(*) AS n FROM widgets GROUP BY name").unwrap();
        let schema = plan.schema();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.field(0).name, "name");
        assert_eq!(schema.field(1).name, "n");
    }

    #[test]
    fn binds_an_inner_join_splitting_equi_key_from_residual_filter() {
        let catalog = sample_catalog();
        let schema2 = Schema::new(vec![
            Field::new("widget_id", LogicalType::Int64, false),
            Field::new("qty", LogicalType::Int64, false),
        ]);
        catalog.register_arrow("orders", schema2, Vec::<Batch>::new());
        let perms = Permissions::default();
        let roles = vec!["opteryx".to_string()];
        let b = binder(&catalog, &perms, &roles);
        let plan = b
            .bind_sql("SELECT widgets.name, orders.qty FROM widgets JOIN orders ON widgets.id = orders.widget_id AND orders.qty > 0")
            .unwrap();
        assert_eq!(plan.schema().len(), 2);
    }

    #[test]
    fn binds_unnest_over_a_literal_tuple() {
        let catalog = sample_catalog();
        let perms = Permissions::default();
        let roles = vec!["opteryx".to_string()];
        let b = binder(&catalog, &perms, &roles);
        let plan = b.bind_sql("SELECT x FROM UNNEST(('a', 'b', 'c')) AS x WHERE x LIKE 'a'").unwrap();
        assert_eq!(plan.schema().len(), 1);
        assert_eq!(plan.schema().field(0).name, "x");
    }

    #[test]
    fn for_clause_attaches_a_temporal_selector_to_the_scan() {
        let catalog = sample_catalog();
        let perms = Permissions::default();
        let roles = vec!["opteryx".to_string()];
        let b = binder(&catalog, &perms, &roles);
        let plan = b.bind_sql("SELECT * FROM widgets FOR TODAY").unwrap();
        fn find_scan(plan: &LogicalPlan) -> Option<&DatasetRef> {
            match plan {
                LogicalPlan::Scan { dataset, .. } => Some(dataset),
                other => other.children().into_iter().find_map(find_scan),
            }
        }
        let dataset = find_scan(&plan).expect("scan node");
        assert!(dataset.temporal.is_some());
    }
}

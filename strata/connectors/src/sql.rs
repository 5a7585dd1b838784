//! Translates pushed projection/predicate/limit into SQL and executes it via
//! a server-side cursor against a relational database. Incompatible
//! predicates are returned as residuals for the engine to re-apply.

use crate::connector::{
    BatchStream, Capabilities, Connector, ConnectorMode, DateRange, PartitionKey, ScanRequest,
};
use crate::predicate::{DnfComparison, DnfOp, DnfPredicate};
use async_trait::async_trait;
use strata_common::{Batch, RelationStatistics, Result, Schema, StrataError};

/// Builds a `SELECT` statement from a pushed scan request and reports
/// whether the predicate was fully honored (no residual needed).
pub fn build_select(table: &str, schema: &Schema, request: &ScanRequest) -> (String, bool) {
    let columns = match &request.projection {
        Some(cols) if !cols.is_empty() => cols.join(", "),
        _ => schema
            .fields()
            .iter()
            .map(|f| f.name.clone())
            .collect::<Vec<_>>()
            .join(", "),
    };

    let mut sql = format!("SELECT {columns} FROM {table}");
    let mut fully_pushed = true;
    if let Some(predicate) = &request.predicate {
        match render_predicate(predicate) {
            Some(clause) => sql.push_str(&format!(" WHERE {clause}")),
            None => fully_pushed = false,
        }
    }
    if let Some(limit) = request.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    (sql, fully_pushed)
}

fn render_comparison(c: &DnfComparison) -> Option<String> {
    let value = |v: &strata_common::ScalarValue| render_literal(v);
    match c.op {
        DnfOp::Eq => Some(format!("{} = {}", c.column, value(c.value.as_ref()?))),
        DnfOp::NotEq => Some(format!("{} <> {}", c.column, value(c.value.as_ref()?))),
        DnfOp::Lt => Some(format!("{} < {}", c.column, value(c.value.as_ref()?))),
        DnfOp::LtEq => Some(format!("{} <= {}", c.column, value(c.value.as_ref()?))),
        DnfOp::Gt => Some(format!("{} > {}", c.column, value(c.value.as_ref()?))),
        DnfOp::GtEq => Some(format!("{} >= {}", c.column, value(c.value.as_ref()?))),
        DnfOp::IsNull => Some(format!("{} IS NULL", c.column)),
        DnfOp::IsNotNull => Some(format!("{} IS NOT NULL", c.column)),
        DnfOp::In if !c.values.is_empty() => {
            let list = c.values.iter().map(render_literal).collect::<Vec<_>>().join(", ");
            Some(format!("{} IN ({list})", c.column))
        }
        DnfOp::NotIn if !c.values.is_empty() => {
            let list = c.values.iter().map(render_literal).collect::<Vec<_>>().join(", ");
            Some(format!("{} NOT IN ({list})", c.column))
        }
        // LIKE translation requires knowing the server's escape dialect;
        // treated as a residual rather than guessed.
        DnfOp::Like | DnfOp::NotLike => None,
        _ => None,
    }
}

fn render_predicate(predicate: &DnfPredicate) -> Option<String> {
    match predicate {
        DnfPredicate::Comparison(c) => render_comparison(c),
        DnfPredicate::And(parts) => {
            let rendered: Option<Vec<String>> = parts.iter().map(render_predicate).collect();
            rendered.map(|r| format!("({})", r.join(" AND ")))
        }
        DnfPredicate::Or(parts) => {
            let rendered: Option<Vec<String>> = parts.iter().map(render_predicate).collect();
            rendered.map(|r| format!("({})", r.join(" OR ")))
        }
    }
}

fn render_literal(v: &strata_common::ScalarValue) -> String {
    use strata_common::ScalarValue::*;
    match v {
        Utf8(Some(s)) => format!("'{}'", s.replace('\'', "''")),
        Int64(Some(i)) => i.to_string(),
        Double(Some(d)) => d.to_string(),
        Boolean(Some(b)) => b.to_string(),
        _ => "NULL".to_string(),
    }
}

/// Executes queries through a server-side cursor. The cursor client itself
/// (`tokio_postgres::Client` or an equivalent driver) and its row-to-`Batch`
/// decoding are external collaborators; this connector owns only the
/// pushdown translation and the pull-based batch boundary.
#[async_trait]
pub trait SqlCursorClient: Send + Sync {
    async fn query_batches(&self, sql: &str, schema: &Schema) -> Result<BatchStream>;
}

pub struct SqlConnector {
    table: String,
    schema: Schema,
    client: std::sync::Arc<dyn SqlCursorClient>,
    statistics: RelationStatistics,
}

impl SqlConnector {
    pub fn new(table: impl Into<String>, schema: Schema, client: std::sync::Arc<dyn SqlCursorClient>) -> Self {
        Self {
            table: table.into(),
            schema,
            client,
            statistics: RelationStatistics::unknown(),
        }
    }
}

#[async_trait]
impl Connector for SqlConnector {
    fn get_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    fn get_statistics(&self) -> Result<RelationStatistics> {
        Ok(self.statistics.clone())
    }

    async fn list_partitions(&self, _range: DateRange) -> Result<Vec<PartitionKey>> {
        Ok(Vec::new())
    }

    async fn read_dataset(&self, request: ScanRequest) -> Result<BatchStream> {
        let (sql, _fully_pushed) = build_select(&self.table, &self.schema, &request);
        log::debug!("sql connector pushing down: {sql}");
        self.client
            .query_batches(&sql, &self.schema)
            .await
            .map_err(|e| StrataError::DatasetReadError {
                dataset: self.table.clone(),
                message: e.to_string(),
            })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            predicate_pushdown: true,
            projection_pushdown: true,
            limit_pushdown: true,
            can_push_compound_predicates: true,
        }
    }

    fn mode(&self) -> ConnectorMode {
        ConnectorMode::ReadOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::DnfComparison;
    use strata_common::{Field, LogicalType, ScalarValue};

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", LogicalType::Int64, false),
            Field::new("name", LogicalType::Varchar, true),
        ])
    }

    #[test]
    fn builds_select_with_predicate_and_limit() {
        let request = ScanRequest {
            projection: Some(vec!["id".to_string()]),
            predicate: Some(DnfPredicate::Comparison(DnfComparison {
                column: "id".to_string(),
                op: DnfOp::Eq,
                value: Some(ScalarValue::Int64(Some(3))),
                values: vec![],
            })),
            limit: Some(10),
            temporal: None,
        };
        let (sql, fully_pushed) = build_select("planets", &schema(), &request);
        assert_eq!(sql, "SELECT id FROM planets WHERE id = 3 LIMIT 10");
        assert!(fully_pushed);
    }

    #[test]
    fn like_predicate_is_residual() {
        let request = ScanRequest {
            projection: None,
            predicate: Some(DnfPredicate::Comparison(DnfComparison {
                column: "name".to_string(),
                op: DnfOp::Like,
                value: Some(ScalarValue::Utf8(Some("A%".to_string()))),
                values: vec![],
            })),
            limit: None,
            temporal: None,
        };
        let (sql, fully_pushed) = build_select("planets", &schema(), &request);
        assert_eq!(sql, "SELECT id, name FROM planets");
        assert!(!fully_pushed);
    }
}

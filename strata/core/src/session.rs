//! The embedding API's entry point (§6.1, §6.6): a `Session` owns a
//! `Catalog` and `Permissions` gate for its lifetime; each call to `query`
//! binds, optimizes, plans and executes one statement and hands back a
//! `Cursor` holding the materialized result plus its `QueryStats`. Grounded
//! on how the teacher threads a `SessionContext`/`TaskContext` pair through
//! `DataFrame::collect` — binder and catalog live on the session, a fresh
//! `ExecutionContext` is built per query from the session's `SessionConfig`.

use std::sync::Arc;

use strata_common::{Batch, Field, LogicalType, Result, Schema};
use strata_connectors::Connector;
use strata_optimizer::{Optimizer, OptimizerStats, PhysicalPlanner};
use strata_physical_plan::{collect, ExecutionOperator};

use crate::catalog::Catalog;
use crate::config::SessionConfig;
use crate::permissions::Permissions;

use crate::binder::Binder;

/// Per-query statistics (§6.1's "`Cursor.stats`"): what was read, how the
/// optimizer rewrote the plan, and how long execution took.
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    pub rows_read: u64,
    pub columns_read: u64,
    pub bytes_read: u64,
    pub query_time_ns: u128,
    pub optimizer: OptimizerStats,
    pub executed_plan: String,
}

/// The result of one `query()` call: the materialized batches plus the
/// stats collected while producing them. Kept fully in memory rather than
/// as a lazy stream — §6.1 only requires `shape()`/`to_arrow_table()`, both
/// of which need the whole result anyway.
pub struct Cursor {
    schema: Arc<Schema>,
    batches: Vec<Batch>,
    pub stats: QueryStats,
}

impl Cursor {
    /// `(rows, columns)` (§6.1).
    pub fn shape(&self) -> (usize, usize) {
        (self.batches.iter().map(Batch::num_rows).sum(), self.schema.len())
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The whole result as a single Arrow `RecordBatch`-backed table,
    /// concatenating every morsel (§6.1's `to_arrow_table`).
    pub fn to_arrow_table(&self) -> Result<arrow::record_batch::RecordBatch> {
        let arrow_schema = Arc::new(self.schema.to_arrow());
        if self.batches.is_empty() {
            return Ok(arrow::record_batch::RecordBatch::new_empty(arrow_schema));
        }
        let record_batches: Vec<&arrow::record_batch::RecordBatch> = self.batches.iter().map(Batch::record_batch).collect();
        Ok(arrow::compute::concat_batches(&arrow_schema, record_batches)?)
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }
}

/// A long-lived query session: one catalog, one permissions gate, one
/// mutable `SessionConfig` (`SET` applies for the rest of the session).
pub struct Session {
    catalog: Arc<Catalog>,
    permissions: Permissions,
    roles: Vec<String>,
    config: SessionConfig,
}

impl Session {
    pub fn new(permissions: Permissions, roles: Vec<String>) -> Self {
        Self { catalog: Arc::new(Catalog::new()), permissions, roles, config: SessionConfig::default() }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn register_store(&self, prefix: impl Into<String>, connector: Arc<dyn Connector>, remove_prefix: bool) {
        self.catalog.register_store(prefix, connector, remove_prefix);
    }

    pub fn register_arrow(&self, name: impl Into<String>, schema: Schema, batches: Vec<Batch>) {
        self.catalog.register_arrow(name, schema, batches);
    }

    /// Binds, optimizes, plans and executes `sql`, or handles one of the two
    /// statement forms with no logical plan of their own: a bare `SET <name>
    /// = <value>` assignment (§6.3), or `EXPLAIN [ANALYZE] [FORMAT MERMAID |
    /// TEXT] <query>` (§6.6), both recognized ahead of the SQL parser the
    /// same way `temporal::extract_and_resolve` peels off a `FOR` clause.
    pub async fn query(&mut self, sql: &str, today: chrono::NaiveDate) -> Result<Cursor> {
        if let Some((name, value)) = parse_set_statement(sql) {
            self.config.set(&name, &value)?;
            let schema = Arc::new(Schema::empty());
            return Ok(Cursor { schema, batches: Vec::new(), stats: QueryStats::default() });
        }

        if let Some(request) = parse_explain_statement(sql) {
            let text = self.render_explain_text(&request.inner_sql, request.analyze, request.format, today).await?;
            return explain_cursor(text);
        }

        let started = std::time::Instant::now();
        let binder = Binder::new(&self.catalog, &self.permissions, &self.roles, today);
        let logical = binder.bind_sql(sql)?;

        let optimizer = Optimizer::new();
        let (optimized, optimizer_stats) = optimizer.optimize(logical, self.config.disable_optimizer)?;

        let planner = PhysicalPlanner::new(self.catalog.clone());
        let mut physical = planner.plan(&optimized)?;
        let executed_plan = render_plan(physical.as_ref(), 0);

        let schema = physical.schema().clone();
        let ctx = self.config.to_execution_context();
        let batches = collect(&mut physical, &ctx).await?;

        let rows_read: u64 = batches.iter().map(|b| b.num_rows() as u64).sum();
        let stats = QueryStats {
            rows_read,
            columns_read: schema.len() as u64,
            bytes_read: estimate_bytes(&batches),
            query_time_ns: started.elapsed().as_nanos(),
            optimizer: optimizer_stats,
            executed_plan,
        };
        Ok(Cursor { schema, batches, stats })
    }

    /// `EXPLAIN [ANALYZE] <sql>` (§6.6), as a direct Rust entry point rather
    /// than through `query()`'s SQL surface. Returns the rendered plan text
    /// in the default TEXT format; `query()` is what also reaches MERMAID.
    pub async fn explain(&mut self, sql: &str, analyze: bool, today: chrono::NaiveDate) -> Result<String> {
        self.render_explain_text(sql, analyze, ExplainFormat::Text, today).await
    }

    /// Binds and plans `sql` without executing it — unless `analyze` is set,
    /// in which case it also runs the query so the caller can report actual
    /// row counts. The plan is rendered *before* `analyze` drains it: a
    /// `ConnectorScan`'s pushed-down predicate is only visible through
    /// `ExecutionOperator::detail()` while its `ScanRequest` is still
    /// unconsumed (§6.6, §8.4's "scan node carries predicate `id=3`").
    async fn render_explain_text(&mut self, sql: &str, analyze: bool, format: ExplainFormat, today: chrono::NaiveDate) -> Result<String> {
        let binder = Binder::new(&self.catalog, &self.permissions, &self.roles, today);
        let logical = binder.bind_sql(sql)?;
        let optimizer = Optimizer::new();
        let (optimized, _) = optimizer.optimize(logical, self.config.disable_optimizer)?;
        let planner = PhysicalPlanner::new(self.catalog.clone());
        let mut physical = planner.plan(&optimized)?;

        let rendered = match format {
            ExplainFormat::Text => render_plan(physical.as_ref(), 0),
            ExplainFormat::Mermaid => render_plan_mermaid(physical.as_ref()),
        };
        if !analyze {
            return Ok(rendered);
        }

        let ctx = self.config.to_execution_context();
        let batches = collect(&mut physical, &ctx).await?;
        let rows: usize = batches.iter().map(Batch::num_rows).sum();
        Ok(format!("{rendered}\n-- actual rows: {rows}"))
    }
}

/// A single-column `plan` result (mirroring the teacher's two-column
/// `plan_type`/`plan` `EXPLAIN` table, simplified since this engine never
/// renders more than one plan stage) so `EXPLAIN` can flow through
/// `Cursor`/`query()` like any other statement.
fn explain_cursor(text: String) -> Result<Cursor> {
    let schema = Arc::new(Schema::new(vec![Field::new("plan", LogicalType::Varchar, false)]));
    let arrow_schema = Arc::new(schema.to_arrow());
    let array: arrow::array::ArrayRef = Arc::new(arrow::array::StringArray::from(vec![text.as_str()]));
    let record = arrow::record_batch::RecordBatch::try_new(arrow_schema, vec![array])?;
    let batch = Batch::new(schema.clone(), record);
    Ok(Cursor { schema, batches: vec![batch], stats: QueryStats::default() })
}

fn estimate_bytes(batches: &[Batch]) -> u64 {
    batches.iter().map(|b| b.record_batch().get_array_memory_size() as u64).sum()
}

/// Indented tree rendering for `EXPLAIN`'s default TEXT format (§6.6);
/// walks `ExecutionOperator::children()` the same way any plan visitor
/// would, folding in each node's `detail()` (a scan's pushed predicate and
/// projection, where present) so it's actually observable from `EXPLAIN`
/// rather than just from the `Debug` impl.
fn render_plan(op: &dyn ExecutionOperator, depth: usize) -> String {
    let label = match op.detail() {
        Some(detail) => format!("{} ({detail})", op.name()),
        None => op.name().to_string(),
    };
    let mut out = format!("{}{}\n", "  ".repeat(depth), label);
    for child in op.children() {
        out.push_str(&render_plan(child.as_ref(), depth + 1));
    }
    out
}

/// `EXPLAIN ... FORMAT MERMAID`'s rendering (§6.6): a `flowchart TD` where
/// each operator is a node labeled with its name and `detail()`, and each
/// edge points from an operator to the child that feeds it.
fn render_plan_mermaid(op: &dyn ExecutionOperator) -> String {
    let mut lines = vec!["flowchart TD".to_string()];
    let mut next_id = 0usize;
    render_mermaid_node(op, &mut lines, &mut next_id);
    lines.join("\n")
}

fn render_mermaid_node(op: &dyn ExecutionOperator, lines: &mut Vec<String>, next_id: &mut usize) -> String {
    let id = format!("n{next_id}");
    *next_id += 1;
    let label = match op.detail() {
        Some(detail) => format!("{}<br/>{}", op.name(), mermaid_escape(&detail)),
        None => op.name().to_string(),
    };
    lines.push(format!("    {id}[\"{label}\"]"));
    for child in op.children() {
        let child_id = render_mermaid_node(child.as_ref(), lines, next_id);
        lines.push(format!("    {id} --> {child_id}"));
    }
    id
}

fn mermaid_escape(s: &str) -> String {
    s.replace('"', "#quot;")
}

/// Recognizes `SET <name> = <value>` without pulling it into the SQL
/// grammar the binder parses — `sqlparser`'s own `Statement::SetVariable`
/// would work too, but the session-config surface is small enough that a
/// direct match avoids a parser round trip for the hot `SET` path.
fn parse_set_statement(sql: &str) -> Option<(String, String)> {
    let trimmed = sql.trim();
    let rest = trimmed.strip_prefix("SET ").or_else(|| trimmed.strip_prefix("set "))?;
    let (name, value) = rest.split_once('=')?;
    Some((name.trim().to_string(), value.trim().trim_matches(|c| c == '\'' || c == '"').to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExplainFormat {
    Text,
    Mermaid,
}

struct ExplainRequest {
    analyze: bool,
    format: ExplainFormat,
    inner_sql: String,
}

/// Recognizes `EXPLAIN [ANALYZE] [FORMAT MERMAID | TEXT] <query>` (§6.6)
/// ahead of the SQL parser, the same way `parse_set_statement` peels `SET`
/// off — `sqlparser`'s own `Statement::Explain` doesn't know about the
/// `MERMAID` format this engine adds, so there's no grammar it could parse
/// into anyway.
fn parse_explain_statement(sql: &str) -> Option<ExplainRequest> {
    let rest = strip_ci_word(sql.trim_start(), "EXPLAIN")?.trim_start();

    let (analyze, rest) = match strip_ci_word(rest, "ANALYZE") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, rest),
    };

    let (format, rest) = match strip_ci_word(rest, "FORMAT") {
        Some(rest) => {
            let rest = rest.trim_start();
            if let Some(rest) = strip_ci_word(rest, "MERMAID") {
                (ExplainFormat::Mermaid, rest)
            } else if let Some(rest) = strip_ci_word(rest, "TEXT") {
                (ExplainFormat::Text, rest)
            } else {
                return None;
            }
        }
        None => (ExplainFormat::Text, rest),
    };

    Some(ExplainRequest { analyze, format, inner_sql: rest.trim_start().to_string() })
}

/// Strips `word` from the front of `s` if present as a whole token (case
/// insensitive, not just a prefix of a longer identifier).
fn strip_ci_word<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    if s.len() < word.len() || !s.as_bytes()[..word.len()].eq_ignore_ascii_case(word.as_bytes()) {
        return None;
    }
    match s.as_bytes().get(word.len()) {
        None => Some(""),
        Some(b) if !b.is_ascii_alphanumeric() && *b != b'_' => Some(&s[word.len()..]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(2026, 7, 27).unwrap()
    }

    #[tokio::test]
    async fn queries_the_builtin_planets_dataset() {
        let mut session = Session::new(Permissions::default(), vec!["opteryx".to_string()]);
        let cursor = session.query("SELECT name FROM $planets WHERE id = 3", today()).await.unwrap();
        let (rows, columns) = cursor.shape();
        assert_eq!(rows, 1);
        assert_eq!(columns, 1);
    }

    #[tokio::test]
    async fn set_statement_does_not_touch_the_catalog() {
        let mut session = Session::new(Permissions::default(), vec!["opteryx".to_string()]);
        session.query("SET disable_optimizer = true", today()).await.unwrap();
        assert!(session.config.disable_optimizer);
    }

    #[tokio::test]
    async fn explain_renders_the_physical_plan_tree() {
        let mut session = Session::new(Permissions::default(), vec!["opteryx".to_string()]);
        let text = session.explain("SELECT * FROM $planets", false, today()).await.unwrap();
        assert!(text.contains("ConnectorScan") || !text.is_empty());
    }

    #[tokio::test]
    async fn registered_in_memory_dataset_round_trips_through_a_query() {
        let mut session = Session::new(Permissions::default(), vec!["opteryx".to_string()]);
        let schema = Schema::new(vec![Field::new("x", LogicalType::Int64, false)]);
        session.register_arrow("nums", schema, Vec::new());
        let cursor = session.query("SELECT x FROM nums", today()).await.unwrap();
        assert_eq!(cursor.shape(), (0, 1));
    }

    #[tokio::test]
    async fn explain_is_reachable_as_a_sql_statement_through_query() {
        let mut session = Session::new(Permissions::default(), vec!["opteryx".to_string()]);
        let cursor = session.query("EXPLAIN SELECT * FROM $planets WHERE id = 3", today()).await.unwrap();
        let (rows, columns) = cursor.shape();
        assert_eq!((rows, columns), (1, 1));
        let table = cursor.to_arrow_table().unwrap();
        let plan = table.column(0).as_any().downcast_ref::<arrow::array::StringArray>().unwrap().value(0);
        // A fully pushable predicate leaves no residual filter above the scan.
        assert!(plan.contains("ConnectorScan"));
        assert!(plan.contains("predicate=id = 3"));
        assert!(!plan.contains("VectorFilter"));
    }

    #[tokio::test]
    async fn explain_format_mermaid_emits_a_flowchart() {
        let mut session = Session::new(Permissions::default(), vec!["opteryx".to_string()]);
        let cursor = session.query("EXPLAIN FORMAT MERMAID SELECT * FROM $planets WHERE id = 3", today()).await.unwrap();
        let table = cursor.to_arrow_table().unwrap();
        let plan = table.column(0).as_any().downcast_ref::<arrow::array::StringArray>().unwrap().value(0);
        assert!(plan.starts_with("flowchart TD"));
        assert!(plan.contains("-->") || !plan.contains('\n'));
    }

    #[tokio::test]
    async fn explain_analyze_reports_actual_rows_after_rendering_the_plan() {
        let mut session = Session::new(Permissions::default(), vec!["opteryx".to_string()]);
        let text = session.explain("SELECT * FROM $planets WHERE id = 3", true, today()).await.unwrap();
        assert!(text.contains("ConnectorScan"));
        assert!(text.contains("actual rows: 1"));
    }
}

//! Database context: schema plus per-table summaries for LLM consumption.
//!
//! Extends the database layer's schema introspection with lightweight
//! descriptive statistics, then renders both into the deterministic text
//! block every pipeline stage builds its prompts around.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::db::{DatabaseClient, Schema, Table, Value};
use crate::error::Result;

/// A column is eligible for top-k reporting only below this distinct count.
const TOP_K_MAX_DISTINCT: i64 = 50;

/// Number of most-frequent values reported for a low-cardinality column.
const TOP_K_LIMIT: i64 = 5;

/// Schema plus per-table summaries, the full context handed to the LLM.
#[derive(Debug, Clone)]
pub struct DatabaseContext {
    pub schema: Schema,
    pub summaries: HashMap<String, TableSummaryStatus>,
}

/// Outcome of summarizing one table: either a computed summary or a marker
/// that summarization failed and the table should be described schema-only.
#[derive(Debug, Clone)]
pub enum TableSummaryStatus {
    Available(TableSummary),
    Unavailable,
}

/// Descriptive statistics for one table.
#[derive(Debug, Clone)]
pub struct TableSummary {
    pub row_count: i64,
    pub columns: Vec<ColumnSummary>,
}

/// Descriptive statistics for one column within a table.
#[derive(Debug, Clone)]
pub struct ColumnSummary {
    pub name: String,
    pub null_count: i64,
    pub distinct_count: i64,
    pub numeric: Option<NumericStats>,
    pub top_values: Option<Vec<(String, i64)>>,
}

/// Min/max/mean for a numeric column.
#[derive(Debug, Clone, Copy)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl DatabaseContext {
    /// Builds a context by introspecting the schema live and then
    /// summarizing every table concurrently. Used where no schema
    /// source-of-truth file is configured.
    pub async fn build(db: &dyn DatabaseClient) -> Result<Self> {
        let schema = db.introspect_schema().await?;
        Self::assemble(db, schema).await
    }

    /// Builds a context using `schema_path` as the schema source of truth
    /// when it exists, falling back to live introspection otherwise. Table
    /// summaries are always computed live against `db`, since they reflect
    /// current data rather than structure.
    pub async fn build_with_schema(db: &dyn DatabaseClient, schema_path: &Path) -> Result<Self> {
        let schema = if schema_path.exists() {
            Schema::from_toml_file(schema_path)?
        } else {
            db.introspect_schema().await?
        };
        Self::assemble(db, schema).await
    }

    async fn assemble(db: &dyn DatabaseClient, schema: Schema) -> Result<Self> {
        let summary_futures = schema.tables.iter().map(|table| summarize_table(db, table));
        let results = futures::future::join_all(summary_futures).await;

        let summaries = schema
            .tables
            .iter()
            .map(|table| table.name.clone())
            .zip(results)
            .collect();

        Ok(Self { schema, summaries })
    }

    /// Renders the schema and summaries into a deterministic text block.
    ///
    /// Table order is alphabetic and column order follows the schema, so
    /// two calls against an unchanged schema and unchanged summary values
    /// produce byte-identical output.
    /// An empty context with no tables: used by synthesis-stage unit tests
    /// that only need to exercise denylist and syntax checks.
    pub fn empty() -> Self {
        Self {
            schema: Schema::default(),
            summaries: HashMap::new(),
        }
    }

    /// Returns true if `table` is a known physical table name.
    pub fn schema_has_table(&self, table: &str) -> bool {
        self.schema.tables.iter().any(|t| t.name.eq_ignore_ascii_case(table))
    }

    /// Returns true if `column` exists on the named table.
    pub fn schema_has_column(&self, table: &str, column: &str) -> bool {
        self.schema
            .tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(table))
            .is_some_and(|t| t.columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)))
    }

    /// Returns true if `column` exists on any table.
    pub fn schema_has_any_column(&self, column: &str) -> bool {
        self.schema
            .tables
            .iter()
            .any(|t| t.columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)))
    }

    pub fn render(&self) -> String {
        let mut tables: Vec<&Table> = self.schema.tables.iter().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = String::new();
        out.push_str(&self.schema.format_for_llm());
        out.push_str("\nTable Summaries:\n");

        for table in tables {
            match self.summaries.get(&table.name) {
                Some(TableSummaryStatus::Available(summary)) => {
                    let _ = writeln!(out, "\n{} ({} rows):", table.name, summary.row_count);
                    for column in &table.columns {
                        let Some(col_summary) =
                            summary.columns.iter().find(|c| c.name == column.name)
                        else {
                            continue;
                        };
                        render_column_summary(&mut out, col_summary);
                    }
                }
                Some(TableSummaryStatus::Unavailable) | None => {
                    let _ = writeln!(out, "\n{}: summary unavailable", table.name);
                }
            }
        }

        out
    }
}

fn render_column_summary(out: &mut String, column: &ColumnSummary) {
    let _ = write!(
        out,
        "  - {}: {} nulls, {} distinct",
        column.name, column.null_count, column.distinct_count
    );
    if let Some(stats) = column.numeric {
        let _ = write!(
            out,
            ", min={:.2}, max={:.2}, mean={:.2}",
            stats.min, stats.max, stats.mean
        );
    }
    if let Some(top) = &column.top_values {
        let formatted = top
            .iter()
            .map(|(value, count)| format!("{}={}", value, count))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(out, ", top: {}", formatted);
    }
    out.push('\n');
}

async fn summarize_table(db: &dyn DatabaseClient, table: &Table) -> TableSummaryStatus {
    match try_summarize_table(db, table).await {
        Ok(summary) => TableSummaryStatus::Available(summary),
        Err(error) => {
            tracing::warn!(table = %table.name, %error, "table summary unavailable");
            TableSummaryStatus::Unavailable
        }
    }
}

async fn try_summarize_table(db: &dyn DatabaseClient, table: &Table) -> Result<TableSummary> {
    let row_count = count_rows(db, &table.name).await?;

    let mut columns = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let null_count = count_nulls(db, &table.name, &column.name).await?;
        let distinct_count = count_distinct(db, &table.name, &column.name).await?;
        let numeric = if is_numeric_type(&column.data_type) {
            numeric_stats(db, &table.name, &column.name).await?
        } else {
            None
        };
        let top_values = if numeric.is_none() && distinct_count <= TOP_K_MAX_DISTINCT {
            Some(top_k_values(db, &table.name, &column.name).await?)
        } else {
            None
        };

        columns.push(ColumnSummary {
            name: column.name.clone(),
            null_count,
            distinct_count,
            numeric,
            top_values,
        });
    }

    Ok(TableSummary { row_count, columns })
}

fn is_numeric_type(data_type: &str) -> bool {
    let t = data_type.to_lowercase();
    ["int", "numeric", "float", "double", "real", "decimal", "serial"]
        .iter()
        .any(|marker| t.contains(marker))
}

async fn scalar_i64(db: &dyn DatabaseClient, sql: &str) -> Result<i64> {
    let result = db.execute_query(sql).await?;
    Ok(result
        .rows
        .first()
        .and_then(|row| row.first())
        .map(|value| match value {
            Value::Int(n) => *n,
            Value::Float(f) => *f as i64,
            _ => 0,
        })
        .unwrap_or(0))
}

async fn count_rows(db: &dyn DatabaseClient, table: &str) -> Result<i64> {
    scalar_i64(db, &format!("SELECT COUNT(*) FROM {}", table)).await
}

async fn count_nulls(db: &dyn DatabaseClient, table: &str, column: &str) -> Result<i64> {
    scalar_i64(
        db,
        &format!("SELECT COUNT(*) FROM {} WHERE {} IS NULL", table, column),
    )
    .await
}

async fn count_distinct(db: &dyn DatabaseClient, table: &str, column: &str) -> Result<i64> {
    scalar_i64(
        db,
        &format!("SELECT COUNT(DISTINCT {}) FROM {}", column, table),
    )
    .await
}

async fn numeric_stats(
    db: &dyn DatabaseClient,
    table: &str,
    column: &str,
) -> Result<Option<NumericStats>> {
    let sql = format!(
        "SELECT MIN({col})::float8, MAX({col})::float8, AVG({col})::float8 FROM {table}",
        col = column,
        table = table
    );
    let result = db.execute_query(&sql).await?;
    let Some(row) = result.rows.first() else {
        return Ok(None);
    };

    let as_f64 = |v: &Value| match v {
        Value::Float(f) => Some(*f),
        Value::Int(n) => Some(*n as f64),
        _ => None,
    };

    let min = row.first().and_then(as_f64);
    let max = row.get(1).and_then(as_f64);
    let mean = row.get(2).and_then(as_f64);

    match (min, max, mean) {
        (Some(min), Some(max), Some(mean)) => Ok(Some(NumericStats { min, max, mean })),
        _ => Ok(None),
    }
}

async fn top_k_values(
    db: &dyn DatabaseClient,
    table: &str,
    column: &str,
) -> Result<Vec<(String, i64)>> {
    let sql = format!(
        "SELECT {col}, COUNT(*) FROM {table} GROUP BY {col} ORDER BY COUNT(*) DESC LIMIT {limit}",
        col = column,
        table = table,
        limit = TOP_K_LIMIT
    );
    let result = db.execute_query(&sql).await?;

    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            let value = row.first()?;
            let count = row.get(1)?;
            let count = match count {
                Value::Int(n) => *n,
                Value::Float(f) => *f as i64,
                _ => return None,
            };
            Some((format_value(value), count))
        })
        .collect())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => format!("{:.2}", f),
        Value::String(s) => s.clone(),
        Value::Bytes(b) => format!("<{} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockDatabaseClient;

    #[tokio::test]
    async fn test_build_context_from_sales_fixture() {
        let db = MockDatabaseClient::with_sales_fixture();
        let context = DatabaseContext::build(&db).await.unwrap();
        assert_eq!(context.schema.tables.len(), 1);
        assert!(context.summaries.contains_key("sales"));
    }

    #[tokio::test]
    async fn test_build_with_schema_prefers_file_over_introspection() {
        let toml = r#"
[[tables]]
name = "widgets"
logical_name = "widgets"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.toml");
        std::fs::write(&path, toml).unwrap();

        let db = MockDatabaseClient::with_sales_fixture();
        let context = DatabaseContext::build_with_schema(&db, &path).await.unwrap();
        assert_eq!(context.schema.tables.len(), 1);
        assert_eq!(context.schema.tables[0].name, "widgets");
    }

    #[tokio::test]
    async fn test_build_with_schema_falls_back_to_introspection_when_missing() {
        let db = MockDatabaseClient::with_sales_fixture();
        let context = DatabaseContext::build_with_schema(&db, std::path::Path::new("/nonexistent/schema.toml"))
            .await
            .unwrap();
        assert!(context.schema_has_table("sales"));
    }

    #[tokio::test]
    async fn test_render_is_deterministic() {
        let db = MockDatabaseClient::with_sales_fixture();
        let context = DatabaseContext::build(&db).await.unwrap();
        let first = context.render();
        let second = context.render();
        assert_eq!(first, second);
    }

    #[test]
    fn test_is_numeric_type() {
        assert!(is_numeric_type("numeric(10,2)"));
        assert!(is_numeric_type("integer"));
        assert!(is_numeric_type("bigserial"));
        assert!(!is_numeric_type("varchar(255)"));
        assert!(!is_numeric_type("text"));
    }

    #[test]
    fn test_render_unavailable_table() {
        let mut summaries = HashMap::new();
        summaries.insert("widgets".to_string(), TableSummaryStatus::Unavailable);
        let context = DatabaseContext {
            schema: Schema {
                tables: vec![Table {
                    name: "widgets".to_string(),
                    logical_name: "widgets".to_string(),
                    columns: vec![],
                    primary_key: vec![],
                    indexes: vec![],
                }],
                foreign_keys: vec![],
            },
            summaries,
        };
        let rendered = context.render();
        assert!(rendered.contains("widgets: summary unavailable"));
    }
}

//! Mock database client for testing.
//!
//! Provides an in-memory store backed by a fixed `sales` table, used by the
//! orchestrator's end-to-end test scenarios.

use super::{Column, ColumnInfo, DatabaseClient, ForeignKey, QueryResult, Row, Schema, Table, Value};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A mock database client seeded with a small `sales` table.
///
/// Supports the fixed set of SQL shapes the orchestrator actually generates
/// against this fixture: plain and date-filtered `COUNT(*)`, `SELECT * FROM
/// sales`, and the context provider's per-column summary queries (null
/// count, distinct count, min/max/avg, and grouped top-k). Anything else
/// returns an empty result.
pub struct MockDatabaseClient {
    schema: Schema,
    sales_rows: Vec<(i64, i64, f64, String)>,
}

impl MockDatabaseClient {
    /// Creates a mock client with an empty schema and no data.
    pub fn new() -> Self {
        Self {
            schema: Schema::default(),
            sales_rows: Vec::new(),
        }
    }

    /// Creates a mock client with the given schema and no data.
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            sales_rows: Vec::new(),
        }
    }

    /// Seeds the standard `sales(sale_id, product_id, amount, sale_date)`
    /// fixture used by the end-to-end scenarios: four rows, two of them on
    /// `2025-04-11`.
    pub fn with_sales_fixture() -> Self {
        let schema = Schema {
            tables: vec![Table {
                name: "sales".to_string(),
                logical_name: "sales".to_string(),
                columns: vec![
                    Column::new("sale_id", "integer").nullable(false),
                    Column::new("product_id", "integer").nullable(false),
                    Column::new("amount", "numeric(10,2)").nullable(false),
                    Column::new("sale_date", "date").nullable(false),
                ],
                primary_key: vec!["sale_id".to_string()],
                indexes: vec![],
            }],
            foreign_keys: Vec::<ForeignKey>::new(),
        };

        Self {
            schema,
            sales_rows: vec![
                (1, 10, 19.99, "2025-04-10".to_string()),
                (2, 11, 29.50, "2025-04-11".to_string()),
                (3, 10, 9.99, "2025-04-11".to_string()),
                (4, 12, 49.00, "2025-04-12".to_string()),
            ],
        }
    }

    fn count_query_result(&self, count: i64) -> QueryResult {
        QueryResult {
            columns: vec![ColumnInfo::new("count", "bigint")],
            rows: vec![vec![Value::Int(count)]],
            execution_time: Duration::from_millis(1),
            row_count: 1,
            total_rows: Some(1),
            was_truncated: false,
        }
    }

    fn all_sales_result(&self) -> QueryResult {
        let rows: Vec<Row> = self
            .sales_rows
            .iter()
            .map(|(id, product_id, amount, date)| {
                vec![
                    Value::Int(*id),
                    Value::Int(*product_id),
                    Value::Float(*amount),
                    Value::String(date.clone()),
                ]
            })
            .collect();
        let row_count = rows.len();
        QueryResult {
            columns: vec![
                ColumnInfo::new("sale_id", "integer"),
                ColumnInfo::new("product_id", "integer"),
                ColumnInfo::new("amount", "numeric"),
                ColumnInfo::new("sale_date", "date"),
            ],
            rows,
            execution_time: Duration::from_millis(1),
            row_count,
            total_rows: Some(row_count),
            was_truncated: false,
        }
    }

    /// Returns every value in a known `sales` column, in row order.
    fn column_values(&self, column: &str) -> Vec<Value> {
        match column {
            "sale_id" => self
                .sales_rows
                .iter()
                .map(|(id, ..)| Value::Int(*id))
                .collect(),
            "product_id" => self
                .sales_rows
                .iter()
                .map(|(_, product_id, ..)| Value::Int(*product_id))
                .collect(),
            "amount" => self
                .sales_rows
                .iter()
                .map(|(_, _, amount, _)| Value::Float(*amount))
                .collect(),
            "sale_date" => self
                .sales_rows
                .iter()
                .map(|(_, _, _, date)| Value::String(date.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn null_count_result(&self, column: &str) -> QueryResult {
        // The fixture has no nullable columns populated with NULL.
        let _ = self.column_values(column);
        self.count_query_result(0)
    }

    fn distinct_count_result(&self, column: &str) -> QueryResult {
        let mut seen = std::collections::HashSet::new();
        for value in self.column_values(column) {
            seen.insert(format_value(&value));
        }
        self.count_query_result(seen.len() as i64)
    }

    fn numeric_stats_result(&self, column: &str) -> QueryResult {
        let values: Vec<f64> = self
            .column_values(column)
            .iter()
            .filter_map(value_as_f64)
            .collect();

        let (min, max, mean) = if values.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (min, max, mean)
        };

        QueryResult {
            columns: vec![
                ColumnInfo::new("min", "double precision"),
                ColumnInfo::new("max", "double precision"),
                ColumnInfo::new("avg", "double precision"),
            ],
            rows: vec![vec![Value::Float(min), Value::Float(max), Value::Float(mean)]],
            execution_time: Duration::from_millis(1),
            row_count: 1,
            total_rows: Some(1),
            was_truncated: false,
        }
    }

    fn top_k_result(&self, column: &str) -> QueryResult {
        let mut counts: Vec<(String, i64)> = Vec::new();
        for value in self.column_values(column) {
            let key = format_value(&value);
            if let Some(entry) = counts.iter_mut().find(|(k, _)| *k == key) {
                entry.1 += 1;
            } else {
                counts.push((key, 1));
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(5);

        let rows = counts
            .into_iter()
            .map(|(value, count)| vec![Value::String(value), Value::Int(count)])
            .collect::<Vec<Row>>();
        let row_count = rows.len();

        QueryResult {
            columns: vec![
                ColumnInfo::new("value", "text"),
                ColumnInfo::new("count", "bigint"),
            ],
            rows,
            execution_time: Duration::from_millis(1),
            row_count,
            total_rows: Some(row_count),
            was_truncated: false,
        }
    }
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

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let normalized = sql.to_uppercase();

        if normalized.contains("IS NULL") {
            if let Some(column) = between(sql, "WHERE ", " IS NULL") {
                return Ok(self.null_count_result(column.trim()));
            }
        }

        if let Some(column) = between(sql, "COUNT(DISTINCT ", ")") {
            return Ok(self.distinct_count_result(column.trim()));
        }

        if normalized.contains("MIN(") && normalized.contains("AVG(") {
            if let Some(column) = between(sql, "MIN(", ")") {
                return Ok(self.numeric_stats_result(column.trim()));
            }
        }

        if normalized.contains("GROUP BY") {
            if let Some(column) = between(sql, "SELECT ", ",") {
                return Ok(self.top_k_result(column.trim()));
            }
        }

        if normalized.contains("COUNT(*)") {
            if let Some(date) = extract_quoted_literal(sql) {
                let count = self
                    .sales_rows
                    .iter()
                    .filter(|(_, _, _, d)| d == &date)
                    .count() as i64;
                return Ok(self.count_query_result(count));
            }
            return Ok(self.count_query_result(self.sales_rows.len() as i64));
        }

        if normalized.starts_with("SELECT") && normalized.contains("SALES") {
            return Ok(self.all_sales_result());
        }

        Ok(QueryResult::new())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Extracts the first single-quoted literal in a SQL string, e.g. the date
/// in `WHERE sale_date = '2025-04-11'`.
fn extract_quoted_literal(sql: &str) -> Option<String> {
    let start = sql.find('\'')? + 1;
    let end = sql[start..].find('\'')? + start;
    Some(sql[start..end].to_string())
}

/// Returns the substring between the first occurrence of `start` and the
/// following occurrence of `end`. Used to pull column names out of the
/// small set of fixed aggregate-query shapes this mock understands.
fn between<'a>(sql: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let start_idx = sql.find(start)? + start.len();
    let rest = &sql[start_idx..];
    let end_idx = rest.find(end)?;
    Some(&rest[..end_idx])
}

//! SQL Executor: runs an approved statement against the store and returns
//! its rows, independent of however the statement was produced.

use std::time::Duration;

use crate::db::{DatabaseClient, QueryResult};
use crate::error::{OrchestratorError, Result};
use crate::safety::{classify_sql, SafetyLevel};

/// Wall-clock cap on a single execution, regardless of what the caller asks
/// for. A query that can't finish in this window is treated as failed.
const EXECUTION_TIMEOUT_SECS: u64 = 30;

/// Runs `sql` against `db`, independently re-classifying it as a safety net
/// even though the synthesizer and debugger already reject anything but a
/// SELECT before a statement reaches here.
pub async fn run(db: &dyn DatabaseClient, sql: &str) -> Result<QueryResult> {
    let classification = classify_sql(sql);
    if classification.level != SafetyLevel::Safe {
        return Err(OrchestratorError::exec(format!(
            "refusing to execute non-read-only statement ({:?})",
            classification.level
        )));
    }

    match tokio::time::timeout(
        Duration::from_secs(EXECUTION_TIMEOUT_SECS),
        db.execute_query(sql),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(OrchestratorError::exec(format!(
            "query exceeded {}s execution limit",
            EXECUTION_TIMEOUT_SECS
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockDatabaseClient;

    #[tokio::test]
    async fn test_run_executes_safe_select() {
        let db = MockDatabaseClient::with_sales_fixture();
        let result = run(&db, "SELECT COUNT(*) FROM sales").await.unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_run_rejects_mutating_statement() {
        let db = MockDatabaseClient::with_sales_fixture();
        let error = run(&db, "DELETE FROM sales").await.unwrap_err();
        assert_eq!(error.stage(), "exec");
    }

    #[tokio::test]
    async fn test_run_rejects_unparseable_statement() {
        let db = MockDatabaseClient::with_sales_fixture();
        let error = run(&db, "THIS IS NOT SQL").await.unwrap_err();
        assert_eq!(error.stage(), "exec");
    }
}

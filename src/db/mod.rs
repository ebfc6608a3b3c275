//! Database abstraction layer.
//!
//! Provides a trait-based interface for the read-only store this service
//! introspects and queries. Schema introspection and raw SQL execution are
//! the only operations exposed; the storage engine's internals are treated
//! as an external collaborator.

mod mock;
mod postgres;
mod schema;
mod types;

pub use mock::MockDatabaseClient;
pub use postgres::PostgresClient;
pub use schema::{Column, ForeignKey, Index, Schema, Table};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::DatabaseConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Connects to the configured store, retrying transient failures with
/// exponential backoff.
pub async fn connect(config: &DatabaseConfig) -> Result<Box<dyn DatabaseClient>> {
    let client = PostgresClient::connect(config).await?;
    Ok(Box::new(client))
}

/// Trait defining the interface for database clients.
///
/// All operations are read-only from this service's perspective: nothing in
/// this trait ever mutates the underlying store. Write-statement rejection
/// happens upstream, in the SQL Synthesizer and Executor.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Introspects the database schema, returning table and relationship information.
    async fn introspect_schema(&self) -> Result<Schema>;

    /// Executes a SQL statement and returns the results.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

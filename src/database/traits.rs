//! Query executor trait.

use crate::database::result::QueryResult;
use crate::error::DbResult;
use async_trait::async_trait;
use std::time::Duration;

/// Async SQL executor consumed by tool handlers.
///
/// Implementations: [`PostgresExecutor`](crate::database::PostgresExecutor),
/// [`DisconnectedExecutor`](crate::database::DisconnectedExecutor).
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Returns the backend name (e.g., "postgres").
    fn name(&self) -> &'static str;

    /// Runs a statement that returns rows.
    ///
    /// # Arguments
    ///
    /// * `sql` - The statement to run
    /// * `limit` - Optional maximum number of rows to keep
    /// * `timeout` - Upper bound on execution time
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Timeout`](crate::error::DatabaseError::Timeout) when
    /// the statement exceeds `timeout`.
    async fn query(&self, sql: &str, limit: Option<u32>, timeout: Duration)
    -> DbResult<QueryResult>;

    /// Runs a statement and returns the number of affected rows.
    async fn execute(&self, sql: &str, timeout: Duration) -> DbResult<u64>;

    /// Runs all statements in one transaction, rolling back on the first failure.
    ///
    /// Returns the affected row count of each statement, in order.
    async fn transaction(&self, statements: &[String], timeout: Duration) -> DbResult<Vec<u64>>;
}

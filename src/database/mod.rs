//! Data-access layer consumed by the tool handlers.
//!
//! # Feature Flags
//!
//! - `postgres` - Enable the pooled PostgreSQL executor (enabled by default)
//!
//! Without a configured database the server runs against
//! [`DisconnectedExecutor`], so tool listing and code-mode help keep working.

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod result;
pub mod traits;

#[cfg(feature = "postgres")]
pub use postgres::PostgresExecutor;
pub use result::*;
pub use traits::QueryExecutor;

use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, DbResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Executor used when no database is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectedExecutor;

#[async_trait]
impl QueryExecutor for DisconnectedExecutor {
    fn name(&self) -> &'static str {
        "disconnected"
    }

    async fn query(&self, _sql: &str, _limit: Option<u32>, _timeout: Duration) -> DbResult<QueryResult> {
        Err(DatabaseError::NotConnected)
    }

    async fn execute(&self, _sql: &str, _timeout: Duration) -> DbResult<u64> {
        Err(DatabaseError::NotConnected)
    }

    async fn transaction(&self, _statements: &[String], _timeout: Duration) -> DbResult<Vec<u64>> {
        Err(DatabaseError::NotConnected)
    }
}

/// Create an executor for the given configuration.
///
/// # Errors
///
/// Returns [`DatabaseError::ConnectionFailed`] if the pool cannot be created, or
/// when the crate was built without the `postgres` feature.
pub async fn create_executor(config: &DatabaseConfig) -> DbResult<Arc<dyn QueryExecutor>> {
    #[cfg(feature = "postgres")]
    {
        let executor = PostgresExecutor::connect(config).await?;
        Ok(Arc::new(executor))
    }

    #[cfg(not(feature = "postgres"))]
    {
        let _ = config;
        Err(DatabaseError::ConnectionFailed(
            "PostgreSQL support not enabled. Enable the 'postgres' feature.".to_string(),
        ))
    }
}

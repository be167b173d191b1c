//! PostgreSQL executor using `tokio-postgres` and `deadpool`.

use crate::config::DatabaseConfig;
use crate::database::result::{CellValue, Column, QueryResult, Row};
use crate::database::traits::QueryExecutor;
use crate::error::{DatabaseError, DbResult};
use crate::tools::sql::{is_read_only, strip_leading_comments};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Config as DeadpoolConfig, Pool, PoolConfig, Runtime};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_postgres::NoTls;
use tokio_postgres::types::FromSql;
use tracing::{debug, info, instrument};

/// Pooled PostgreSQL executor.
pub struct PostgresExecutor {
    pool: Pool,
}

impl PostgresExecutor {
    /// Create the pool and check out one connection to verify the settings.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!(
            "Connecting to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        let mut deadpool_config = DeadpoolConfig::new();
        deadpool_config.host = Some(config.host.clone());
        deadpool_config.port = Some(config.port);
        deadpool_config.dbname = Some(config.database.clone());
        deadpool_config.user = Some(config.username.clone());
        deadpool_config.password = Some(config.password.clone());
        deadpool_config.pool = Some(PoolConfig::new(config.pool_size));

        let pool = deadpool_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let _conn = pool
            .get()
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        info!(
            "PostgreSQL connection pool created with max size {}",
            config.pool_size
        );

        Ok(Self { pool })
    }

    async fn client(&self) -> DbResult<deadpool_postgres::Client> {
        self.pool.get().await.map_err(|_| DatabaseError::PoolExhausted)
    }

    fn convert_row(pg_row: &tokio_postgres::Row, columns: &[Column]) -> Row {
        let mut row = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            row.insert(col.name.clone(), Self::get_cell_value(pg_row, i, &col.data_type));
        }
        row
    }

    /// Decode one cell using the column's type name; unknown types fall back to text.
    fn get_cell_value(row: &tokio_postgres::Row, index: usize, data_type: &str) -> CellValue {
        let typed = match data_type {
            "int2" => read_cell(row, index, |v: i16| CellValue::Int(i64::from(v))),
            "int4" => read_cell(row, index, |v: i32| CellValue::Int(i64::from(v))),
            "int8" => read_cell(row, index, CellValue::Int),
            "oid" => read_cell(row, index, |v: u32| CellValue::Int(i64::from(v))),
            "float4" => read_cell(row, index, |v: f32| CellValue::Float(f64::from(v))),
            "float8" => read_cell(row, index, CellValue::Float),
            "numeric" => read_cell(row, index, |v: Decimal| CellValue::Decimal(v)),
            "bool" => read_cell(row, index, CellValue::Bool),
            "json" | "jsonb" => read_cell(row, index, CellValue::Json),
            "timestamptz" => read_cell(row, index, |v: DateTime<Utc>| CellValue::DateTime(v)),
            "timestamp" => read_cell(row, index, |v: NaiveDateTime| {
                CellValue::DateTime(DateTime::from_naive_utc_and_offset(v, Utc))
            }),
            "date" => read_cell(row, index, |v: NaiveDate| CellValue::Date(v)),
            _ => None,
        };

        typed
            .or_else(|| read_cell(row, index, CellValue::String))
            .unwrap_or(CellValue::Null)
    }

    async fn with_timeout<T>(
        query_timeout: Duration,
        fut: impl Future<Output = DbResult<T>>,
    ) -> DbResult<T> {
        timeout(query_timeout, fut)
            .await
            .map_err(|_| DatabaseError::Timeout(query_timeout.as_millis() as u64))?
    }
}

fn read_cell<'a, T>(
    row: &'a tokio_postgres::Row,
    index: usize,
    wrap: fn(T) -> CellValue,
) -> Option<CellValue>
where
    T: FromSql<'a>,
{
    match row.try_get::<_, Option<T>>(index) {
        Ok(Some(value)) => Some(wrap(value)),
        Ok(None) => Some(CellValue::Null),
        Err(_) => None,
    }
}

/// Wrap row-returning statements so at most `limit + 1` rows are fetched.
///
/// The closing parenthesis goes on its own line so a trailing `--` comment
/// cannot swallow it.
fn limit_statement(sql: &str, limit: Option<u32>) -> String {
    let trimmed = sql.trim().trim_end_matches(';');
    match limit {
        Some(limit) if is_read_only(trimmed) && allows_subquery(trimmed) => {
            format!(
                "SELECT * FROM (\n{}\n) AS limited_result LIMIT {}",
                trimmed,
                u64::from(limit) + 1
            )
        }
        _ => trimmed.to_string(),
    }
}

/// EXPLAIN and SHOW return rows but cannot appear in FROM.
fn allows_subquery(sql: &str) -> bool {
    let upper = strip_leading_comments(sql).to_uppercase();
    !(upper.starts_with("EXPLAIN") || upper.starts_with("SHOW"))
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self, sql), fields(db = "postgres"))]
    async fn query(
        &self,
        sql: &str,
        limit: Option<u32>,
        query_timeout: Duration,
    ) -> DbResult<QueryResult> {
        let statement = limit_statement(sql, limit);
        debug!("Executing query: {}", statement);

        Self::with_timeout(query_timeout, async {
            let start = Instant::now();
            let conn = self.client().await?;

            let stmt = conn
                .prepare(&statement)
                .await
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

            let pg_rows = conn
                .query(&stmt, &[])
                .await
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

            let columns: Vec<Column> = stmt
                .columns()
                .iter()
                .map(|c| Column::new(c.name(), c.type_().name()))
                .collect();

            let mut rows: Vec<Row> = pg_rows
                .iter()
                .map(|r| Self::convert_row(r, &columns))
                .collect();

            let elapsed = start.elapsed().as_millis() as u64;
            match limit {
                Some(limit) => {
                    let truncated = rows.len() > limit as usize;
                    rows.truncate(limit as usize);
                    Ok(QueryResult::new(columns, rows, elapsed).with_truncated(truncated))
                }
                None => Ok(QueryResult::new(columns, rows, elapsed)),
            }
        })
        .await
    }

    #[instrument(skip(self, sql), fields(db = "postgres"))]
    async fn execute(&self, sql: &str, query_timeout: Duration) -> DbResult<u64> {
        debug!("Executing statement: {}", sql);

        Self::with_timeout(query_timeout, async {
            let conn = self.client().await?;
            conn.execute(sql, &[])
                .await
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
        })
        .await
    }

    #[instrument(skip(self, statements), fields(db = "postgres", statements = statements.len()))]
    async fn transaction(
        &self,
        statements: &[String],
        query_timeout: Duration,
    ) -> DbResult<Vec<u64>> {
        Self::with_timeout(query_timeout, async {
            let mut conn = self.client().await?;
            let client: &mut tokio_postgres::Client = &mut conn;
            let tx = client
                .transaction()
                .await
                .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

            let mut affected = Vec::with_capacity(statements.len());
            for (index, statement) in statements.iter().enumerate() {
                // Dropping `tx` on error rolls the transaction back.
                let count = tx.execute(statement.as_str(), &[]).await.map_err(|e| {
                    DatabaseError::Transaction(format!("statement {} failed: {}", index, e))
                })?;
                affected.push(count);
            }

            tx.commit()
                .await
                .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
            Ok(affected)
        })
        .await
    }
}

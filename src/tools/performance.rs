//! Performance analysis tools: execution plans, index and table statistics,
//! buffer cache hit ratio.

use crate::define_tool;
use crate::error::{Result, ToolError};
use crate::protocol::Tool;
use crate::tools::parse_args;
use crate::tools::registry::{ToolContext, ToolHandler};
use crate::tools::sql::{is_read_only, quote_literal, split_qualified};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{instrument, warn};

const GROUP: &str = "performance";

#[derive(Debug, Deserialize)]
pub struct ExplainArgs {
    pub sql: String,
    #[serde(default)]
    pub analyze: bool,
    #[serde(default)]
    pub buffers: bool,
}

impl ExplainArgs {
    fn build_sql(&self) -> Result<String> {
        // ANALYZE runs the statement.
        if self.analyze && !is_read_only(&self.sql) {
            return Err(ToolError::InvalidArguments(
                "EXPLAIN ANALYZE is only allowed for read-only statements".into(),
            )
            .into());
        }

        let mut options = vec!["FORMAT JSON"];
        if self.analyze {
            options.push("ANALYZE");
            if self.buffers {
                options.push("BUFFERS");
            }
        }
        Ok(format!("EXPLAIN ({}) {}", options.join(", "), self.sql.trim().trim_end_matches(';')))
    }
}

pub struct ExplainTool;

#[async_trait]
impl ToolHandler for ExplainTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_explain",
            description: "Show the execution plan of a statement as JSON. \
                With 'analyze', the (read-only) statement is executed and actual timings are reported.",
            schema: {
                "type": "object",
                "properties": {
                    "sql": { "type": "string" },
                    "analyze": { "type": "boolean", "description": "Run the statement (default: false)" },
                    "buffers": { "type": "boolean", "description": "Include buffer usage (requires analyze)" }
                },
                "required": ["sql"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_explain"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ExplainArgs = parse_args(arguments)?;
        let result = ctx.query(&args.build_sql()?, None).await?;

        let plan = match result.first_value("QUERY PLAN") {
            Some(value) => serde_json::to_value(value)?,
            None => {
                warn!("EXPLAIN returned no plan");
                Value::Null
            }
        };
        Ok(json!({ "plan": plan, "analyzed": args.analyze }))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TableStatsArgs {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl TableStatsArgs {
    fn table_filter(&self, schema_column: &str, table_column: &str) -> String {
        match &self.table {
            Some(table) => {
                let (schema, name) = split_qualified(table);
                format!(
                    " WHERE {} = {} AND {} = {}",
                    schema_column,
                    quote_literal(schema),
                    table_column,
                    quote_literal(name)
                )
            }
            None => String::new(),
        }
    }

    fn index_stats_sql(&self) -> String {
        format!(
            "SELECT schemaname AS schema, relname AS table, indexrelname AS index, \
             idx_scan AS scans, idx_tup_read AS tuples_read, idx_tup_fetch AS tuples_fetched, \
             pg_size_pretty(pg_relation_size(indexrelid)) AS size \
             FROM pg_stat_user_indexes{} ORDER BY idx_scan ASC, schemaname, relname",
            self.table_filter("schemaname", "relname")
        )
    }

    fn table_stats_sql(&self) -> String {
        format!(
            "SELECT schemaname AS schema, relname AS table, seq_scan, idx_scan, \
             n_live_tup AS live_rows, n_dead_tup AS dead_rows, \
             last_vacuum, last_autovacuum, last_analyze, last_autoanalyze, \
             pg_size_pretty(pg_total_relation_size(relid)) AS total_size \
             FROM pg_stat_user_tables{} ORDER BY n_live_tup DESC",
            self.table_filter("schemaname", "relname")
        )
    }
}

pub struct IndexStatsTool;

#[async_trait]
impl ToolHandler for IndexStatsTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_index_stats",
            description: "Index usage statistics; rarely scanned indexes are listed first.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string", "description": "Restrict to one table" },
                    "limit": { "type": "integer", "minimum": 1 }
                }
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_index_stats"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: TableStatsArgs = parse_args(arguments)?;
        let result = ctx.query(&args.index_stats_sql(), args.limit).await?;
        Ok(json!({ "indexes": result.rows, "count": result.row_count }))
    }
}

pub struct TableStatsTool;

#[async_trait]
impl ToolHandler for TableStatsTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_table_stats",
            description: "Table statistics: scans, live and dead rows, vacuum and analyze times, size.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string", "description": "Restrict to one table" },
                    "limit": { "type": "integer", "minimum": 1 }
                }
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_table_stats"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: TableStatsArgs = parse_args(arguments)?;
        let result = ctx.query(&args.table_stats_sql(), args.limit).await?;
        Ok(json!({ "tables": result.rows, "count": result.row_count }))
    }
}

const CACHE_HIT_SQL: &str = "SELECT \
    sum(heap_blks_hit) AS heap_hit, sum(heap_blks_read) AS heap_read, \
    round(sum(heap_blks_hit)::numeric / nullif(sum(heap_blks_hit) + sum(heap_blks_read), 0), 4)::float8 AS table_ratio, \
    round(sum(idx_blks_hit)::numeric / nullif(sum(idx_blks_hit) + sum(idx_blks_read), 0), 4)::float8 AS index_ratio \
    FROM pg_statio_user_tables";

pub struct CacheHitRatioTool;

#[async_trait]
impl ToolHandler for CacheHitRatioTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_cache_hit_ratio",
            description: "Buffer cache hit ratio for tables and indexes (healthy is above 0.99).",
            schema: { "type": "object", "properties": {} }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, _arguments, ctx), fields(tool = "pg_cache_hit_ratio"))]
    async fn execute(&self, _arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let result = ctx.query(CACHE_HIT_SQL, None).await?;
        let row = result.rows.into_iter().next().unwrap_or_default();
        Ok(serde_json::to_value(row)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{CellValue, Column, QueryResult};
    use crate::testing::recording_context;

    #[test]
    fn test_explain_sql() {
        let plain = ExplainArgs {
            sql: "SELECT * FROM users;".into(),
            analyze: false,
            buffers: true,
        };
        assert_eq!(plain.build_sql().unwrap(), "EXPLAIN (FORMAT JSON) SELECT * FROM users");

        let analyzed = ExplainArgs {
            sql: "SELECT 1".into(),
            analyze: true,
            buffers: true,
        };
        assert_eq!(
            analyzed.build_sql().unwrap(),
            "EXPLAIN (FORMAT JSON, ANALYZE, BUFFERS) SELECT 1"
        );
    }

    #[test]
    fn test_explain_analyze_rejects_writes() {
        let args = ExplainArgs {
            sql: "DELETE FROM users".into(),
            analyze: true,
            buffers: false,
        };
        assert!(args.build_sql().is_err());
    }

    #[test]
    fn test_stats_table_filter() {
        let args = TableStatsArgs {
            table: Some("sales.orders".into()),
            limit: None,
        };
        assert!(args.index_stats_sql().contains("WHERE schemaname = 'sales' AND relname = 'orders'"));
        assert!(!TableStatsArgs::default().table_stats_sql().contains("WHERE"));
    }

    #[tokio::test]
    async fn test_explain_returns_plan() {
        let (ctx, executor) = recording_context();
        let plan = json!([{"Plan": {"Node Type": "Seq Scan"}}]);
        let row = [("QUERY PLAN".to_string(), CellValue::Json(plan.clone()))]
            .into_iter()
            .collect();
        executor.respond_with(QueryResult::new(vec![Column::new("QUERY PLAN", "json")], vec![row], 1));

        let result = ExplainTool.execute(json!({"sql": "SELECT 1"}), &ctx).await.unwrap();
        assert_eq!(result["plan"], plan);
        assert_eq!(result["analyzed"], false);
    }
}

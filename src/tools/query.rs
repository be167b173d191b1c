//! Core tools: read/write queries, table listing and description, DDL
//! helpers, count and exists.

use crate::define_tool;
use crate::error::{Result, ToolError};
use crate::protocol::Tool;
use crate::tools::registry::{ToolContext, ToolHandler};
use crate::tools::sql::{
    is_read_only, quote_ident, quote_ident_list, quote_literal, split_qualified, where_clause,
};
use crate::tools::{OneOrMany, parse_args};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

const GROUP: &str = "core";
const DEFAULT_READ_LIMIT: u32 = 1000;

/// Column types accepted by `pg_create_table`, e.g. `varchar(255)`, `numeric(10, 2)`, `text[]`.
static COLUMN_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_ ]*(\(\s*\d+(\s*,\s*\d+)?\s*\))?(\[\])*$")
        .expect("Invalid regex: column type pattern")
});

#[derive(Debug, Deserialize)]
pub struct ReadQueryArgs {
    pub sql: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

pub struct ReadQueryTool;

#[async_trait]
impl ToolHandler for ReadQueryTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_read_query",
            description: "Run a read-only SQL statement (SELECT, WITH, EXPLAIN, SHOW, VALUES, TABLE) \
                and return its rows. Use 'limit' instead of a LIMIT clause.",
            schema: {
                "type": "object",
                "properties": {
                    "sql": { "type": "string", "description": "Read-only SQL statement" },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum rows to return (default: 1000)",
                        "minimum": 1,
                        "maximum": 100000
                    }
                },
                "required": ["sql"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_read_query"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ReadQueryArgs = parse_args(arguments)?;
        if !is_read_only(&args.sql) {
            return Err(ToolError::InvalidArguments(
                "Only read-only statements are allowed; use writeQuery for changes".into(),
            )
            .into());
        }

        let result = ctx
            .query(&args.sql, Some(args.limit.unwrap_or(DEFAULT_READ_LIMIT)))
            .await?;
        Ok(serde_json::to_value(result)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct WriteQueryArgs {
    pub sql: String,
}

pub struct WriteQueryTool;

#[async_trait]
impl ToolHandler for WriteQueryTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_write_query",
            description: "Run a data-modifying SQL statement (INSERT, UPDATE, DELETE, DDL) \
                and return the number of affected rows.",
            schema: {
                "type": "object",
                "properties": {
                    "sql": { "type": "string", "description": "SQL statement to execute" }
                },
                "required": ["sql"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_write_query"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: WriteQueryArgs = parse_args(arguments)?;
        if is_read_only(&args.sql) {
            return Err(ToolError::InvalidArguments(
                "Read-only statement; use readQuery to fetch rows".into(),
            )
            .into());
        }

        let rows_affected = ctx.execute(&args.sql).await?;
        Ok(json!({ "rows_affected": rows_affected }))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTablesArgs {
    #[serde(default)]
    pub schema: Option<String>,
}

impl ListTablesArgs {
    fn build_sql(&self) -> String {
        let filter = match &self.schema {
            Some(schema) => format!("table_schema = {}", quote_literal(schema)),
            None => "table_schema NOT IN ('pg_catalog', 'information_schema')".to_string(),
        };
        format!(
            "SELECT table_schema AS schema, table_name AS name, table_type AS type \
             FROM information_schema.tables WHERE {} ORDER BY table_schema, table_name",
            filter
        )
    }
}

pub struct ListTablesTool;

#[async_trait]
impl ToolHandler for ListTablesTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_list_tables",
            description: "List tables and views, optionally restricted to one schema.",
            schema: {
                "type": "object",
                "properties": {
                    "schema": { "type": "string", "description": "Schema name (default: all user schemas)" }
                }
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_list_tables"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ListTablesArgs = parse_args(arguments)?;
        let result = ctx.query(&args.build_sql(), None).await?;
        Ok(json!({ "tables": result.rows, "count": result.row_count }))
    }
}

pub struct ListSchemasTool;

#[async_trait]
impl ToolHandler for ListSchemasTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_list_schemas",
            description: "List user schemas in the current database.",
            schema: { "type": "object", "properties": {} }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, _arguments, ctx), fields(tool = "pg_list_schemas"))]
    async fn execute(&self, _arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let result = ctx
            .query(
                "SELECT schema_name AS name, schema_owner AS owner FROM information_schema.schemata \
                 WHERE schema_name NOT IN ('pg_catalog', 'information_schema') \
                 AND schema_name NOT LIKE 'pg_toast%' AND schema_name NOT LIKE 'pg_temp%' \
                 ORDER BY schema_name",
                None,
            )
            .await?;
        Ok(json!({ "schemas": result.rows }))
    }
}

#[derive(Debug, Deserialize)]
pub struct DescribeTableArgs {
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
}

impl DescribeTableArgs {
    fn target(&self) -> (String, String) {
        let (schema, table) = split_qualified(&self.table);
        let schema = self.schema.as_deref().unwrap_or(schema);
        (schema.to_string(), table.to_string())
    }

    fn build_sql(&self) -> String {
        let (schema, table) = self.target();
        format!(
            "SELECT column_name AS name, data_type AS type, is_nullable = 'YES' AS nullable, \
             column_default AS default_value FROM information_schema.columns \
             WHERE table_schema = {} AND table_name = {} ORDER BY ordinal_position",
            quote_literal(&schema),
            quote_literal(&table)
        )
    }
}

pub struct DescribeTableTool;

#[async_trait]
impl ToolHandler for DescribeTableTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_describe_table",
            description: "Describe the columns of a table: name, type, nullability and default.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string", "description": "Table name, optionally schema-qualified" },
                    "schema": { "type": "string", "description": "Schema name (default: public)" }
                },
                "required": ["table"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_describe_table"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: DescribeTableArgs = parse_args(arguments)?;
        let (schema, table) = args.target();
        let result = ctx.query(&args.build_sql(), None).await?;
        if result.rows.is_empty() {
            return Err(ToolError::ExecutionFailed(format!("Table not found: {}.{}", schema, table)).into());
        }
        Ok(json!({ "schema": schema, "table": table, "columns": result.rows }))
    }
}

#[derive(Debug, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default, alias = "primaryKey")]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateTableArgs {
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default, alias = "ifNotExists")]
    pub if_not_exists: bool,
}

impl CreateTableArgs {
    fn build_sql(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(ToolError::InvalidArguments("At least one column is required".into()).into());
        }

        let columns = self
            .columns
            .iter()
            .map(|column| {
                if !COLUMN_TYPE.is_match(column.data_type.trim()) {
                    return Err(ToolError::InvalidArguments(format!(
                        "Invalid type for column {}: '{}'",
                        column.name, column.data_type
                    ))
                    .into());
                }
                let mut definition = format!("{} {}", quote_ident(&column.name)?, column.data_type.trim());
                if column.primary_key {
                    definition.push_str(" PRIMARY KEY");
                } else if !column.nullable {
                    definition.push_str(" NOT NULL");
                }
                if column.unique {
                    definition.push_str(" UNIQUE");
                }
                if let Some(default) = &column.default {
                    definition.push_str(&format!(" DEFAULT {}", default));
                }
                Ok(definition)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "CREATE TABLE {}{} ({})",
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            quote_ident(&self.table)?,
            columns.join(", ")
        ))
    }
}

pub struct CreateTableTool;

#[async_trait]
impl ToolHandler for CreateTableTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_create_table",
            description: "Create a table from a list of column definitions.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string", "description": "Table name, optionally schema-qualified" },
                    "columns": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "type": { "type": "string" },
                                "nullable": { "type": "boolean" },
                                "primary_key": { "type": "boolean" },
                                "unique": { "type": "boolean" },
                                "default": { "type": "string", "description": "SQL default expression" }
                            },
                            "required": ["name", "type"]
                        }
                    },
                    "if_not_exists": { "type": "boolean" }
                },
                "required": ["table", "columns"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_create_table"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: CreateTableArgs = parse_args(arguments)?;
        let sql = args.build_sql()?;
        ctx.execute(&sql).await?;
        Ok(json!({ "success": true, "table": args.table, "sql": sql }))
    }
}

#[derive(Debug, Deserialize)]
pub struct DropTableArgs {
    pub table: String,
    #[serde(default = "default_true", alias = "ifExists")]
    pub if_exists: bool,
    #[serde(default)]
    pub cascade: bool,
}

impl DropTableArgs {
    fn build_sql(&self) -> Result<String> {
        Ok(format!(
            "DROP TABLE {}{}{}",
            if self.if_exists { "IF EXISTS " } else { "" },
            quote_ident(&self.table)?,
            if self.cascade { " CASCADE" } else { "" }
        ))
    }
}

pub struct DropTableTool;

#[async_trait]
impl ToolHandler for DropTableTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_drop_table",
            description: "Drop a table.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "if_exists": { "type": "boolean", "description": "Default: true" },
                    "cascade": { "type": "boolean", "description": "Also drop dependent objects" }
                },
                "required": ["table"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_drop_table"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: DropTableArgs = parse_args(arguments)?;
        ctx.execute(&args.build_sql()?).await?;
        Ok(json!({ "success": true, "table": args.table }))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateIndexArgs {
    pub table: String,
    pub columns: OneOrMany,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, alias = "ifNotExists")]
    pub if_not_exists: bool,
    #[serde(default)]
    pub method: Option<String>,
}

impl CreateIndexArgs {
    fn index_name(&self, columns: &[String]) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => {
                let (_, table) = split_qualified(&self.table);
                format!("idx_{}_{}", table, columns.join("_"))
            }
        }
    }

    fn build_sql(&self) -> Result<String> {
        let columns = self.columns.to_vec();
        let method = match self.method.as_deref().map(str::to_lowercase) {
            None => String::new(),
            Some(m) if matches!(m.as_str(), "btree" | "hash" | "gin" | "gist" | "brin" | "spgist") => {
                format!(" USING {}", m)
            }
            Some(m) => {
                return Err(ToolError::InvalidArguments(format!("Unknown index method: {}", m)).into());
            }
        };

        Ok(format!(
            "CREATE {}INDEX {}{} ON {}{} ({})",
            if self.unique { "UNIQUE " } else { "" },
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            quote_ident(&self.index_name(&columns))?,
            quote_ident(&self.table)?,
            method,
            quote_ident_list(&columns)?
        ))
    }
}

pub struct CreateIndexTool;

#[async_trait]
impl ToolHandler for CreateIndexTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_create_index",
            description: "Create an index on one or more columns.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "columns": {
                        "oneOf": [
                            { "type": "string" },
                            { "type": "array", "items": { "type": "string" } }
                        ]
                    },
                    "name": { "type": "string", "description": "Index name (default: idx_<table>_<columns>)" },
                    "unique": { "type": "boolean" },
                    "if_not_exists": { "type": "boolean" },
                    "method": { "type": "string", "enum": ["btree", "hash", "gin", "gist", "brin", "spgist"] }
                },
                "required": ["table", "columns"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_create_index"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: CreateIndexArgs = parse_args(arguments)?;
        let sql = args.build_sql()?;
        ctx.execute(&sql).await?;
        Ok(json!({ "success": true, "index": args.index_name(&args.columns.to_vec()), "sql": sql }))
    }
}

#[derive(Debug, Deserialize)]
pub struct TableFilterArgs {
    pub table: String,
    #[serde(default, rename = "where", alias = "filter")]
    pub filter: Option<String>,
}

impl TableFilterArgs {
    fn count_sql(&self) -> Result<String> {
        Ok(format!(
            "SELECT count(*) AS count FROM {}{}",
            quote_ident(&self.table)?,
            where_clause(self.filter.as_deref())
        ))
    }

    fn exists_sql(&self) -> Result<String> {
        Ok(format!(
            "SELECT EXISTS (SELECT 1 FROM {}{}) AS exists",
            quote_ident(&self.table)?,
            where_clause(self.filter.as_deref())
        ))
    }
}

pub struct CountTool;

#[async_trait]
impl ToolHandler for CountTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_count",
            description: "Count rows in a table, optionally filtered by a WHERE condition.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "where": { "type": "string", "description": "SQL condition without the WHERE keyword" }
                },
                "required": ["table"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_count"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: TableFilterArgs = parse_args(arguments)?;
        let result = ctx.query(&args.count_sql()?, None).await?;
        let count = result.first_value("count").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(json!({ "count": count }))
    }
}

pub struct ExistsTool;

#[async_trait]
impl ToolHandler for ExistsTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_exists",
            description: "Check whether any row matches a WHERE condition.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "where": { "type": "string", "description": "SQL condition without the WHERE keyword" }
                },
                "required": ["table"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_exists"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: TableFilterArgs = parse_args(arguments)?;
        let result = ctx.query(&args.exists_sql()?, None).await?;
        let exists = result.first_value("exists").and_then(|v| v.as_bool()).unwrap_or(false);
        Ok(json!({ "exists": exists }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{CellValue, Column, QueryResult};
    use crate::error::McpError;
    use crate::testing::recording_context;

    #[tokio::test]
    async fn test_read_query_rejects_writes() {
        let (ctx, executor) = recording_context();
        let result = ReadQueryTool
            .execute(json!({"sql": "DELETE FROM users"}), &ctx)
            .await;

        assert!(matches!(result, Err(McpError::Tool(ToolError::InvalidArguments(_)))));
        assert!(executor.statements().is_empty());
    }

    #[tokio::test]
    async fn test_write_query_rejects_reads() {
        let (ctx, _) = recording_context();
        let result = WriteQueryTool.execute(json!({"sql": "SELECT 1"}), &ctx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_write_query_reports_rows_affected() {
        let (ctx, executor) = recording_context();
        let result = WriteQueryTool
            .execute(json!({"sql": "UPDATE users SET active = true"}), &ctx)
            .await
            .unwrap();

        assert_eq!(result["rows_affected"], 1);
        assert_eq!(
            executor.last_statement().as_deref(),
            Some("UPDATE users SET active = true")
        );
    }

    #[test]
    fn test_list_tables_sql() {
        let args = ListTablesArgs {
            schema: Some("sales".into()),
        };
        assert!(args.build_sql().contains("table_schema = 'sales'"));
        assert!(ListTablesArgs::default().build_sql().contains("NOT IN ('pg_catalog'"));
    }

    #[test]
    fn test_describe_table_target() {
        let args: DescribeTableArgs = serde_json::from_value(json!({"table": "sales.orders"})).unwrap();
        assert_eq!(args.target(), ("sales".to_string(), "orders".to_string()));

        let args: DescribeTableArgs =
            serde_json::from_value(json!({"table": "orders", "schema": "archive"})).unwrap();
        assert_eq!(args.target(), ("archive".to_string(), "orders".to_string()));
    }

    #[test]
    fn test_create_table_sql() {
        let args: CreateTableArgs = serde_json::from_value(json!({
            "table": "orders",
            "columns": [
                {"name": "id", "type": "serial", "primary_key": true},
                {"name": "total", "type": "numeric(10, 2)", "nullable": false},
                {"name": "created_at", "type": "timestamptz", "default": "now()"}
            ],
            "if_not_exists": true
        }))
        .unwrap();

        assert_eq!(
            args.build_sql().unwrap(),
            "CREATE TABLE IF NOT EXISTS \"orders\" (\"id\" serial PRIMARY KEY, \
             \"total\" numeric(10, 2) NOT NULL, \"created_at\" timestamptz DEFAULT now())"
        );
    }

    #[test]
    fn test_create_table_rejects_bad_type() {
        let args: CreateTableArgs = serde_json::from_value(json!({
            "table": "t",
            "columns": [{"name": "a", "type": "int); DROP TABLE x; --"}]
        }))
        .unwrap();
        assert!(args.build_sql().is_err());
    }

    #[test]
    fn test_create_index_sql() {
        let args: CreateIndexArgs = serde_json::from_value(json!({
            "table": "orders",
            "columns": ["customer_id", "created_at"],
            "unique": true
        }))
        .unwrap();
        assert_eq!(
            args.build_sql().unwrap(),
            "CREATE UNIQUE INDEX \"idx_orders_customer_id_created_at\" ON \"orders\" \
             (\"customer_id\", \"created_at\")"
        );

        let single: CreateIndexArgs = serde_json::from_value(json!({
            "table": "docs", "columns": "body", "method": "GIN", "name": "docs_body"
        }))
        .unwrap();
        assert_eq!(
            single.build_sql().unwrap(),
            "CREATE INDEX \"docs_body\" ON \"docs\" USING gin (\"body\")"
        );
    }

    #[test]
    fn test_drop_table_sql() {
        let args: DropTableArgs = serde_json::from_value(json!({"table": "old", "cascade": true})).unwrap();
        assert_eq!(args.build_sql().unwrap(), "DROP TABLE IF EXISTS \"old\" CASCADE");
    }

    #[tokio::test]
    async fn test_count_reads_first_row() {
        let (ctx, executor) = recording_context();
        let row = [("count".to_string(), CellValue::Int(42))].into_iter().collect();
        executor.respond_with(QueryResult::new(vec![Column::new("count", "int8")], vec![row], 1));

        let result = CountTool
            .execute(json!({"table": "orders", "where": "total > 10"}), &ctx)
            .await
            .unwrap();

        assert_eq!(result["count"], 42);
        assert_eq!(
            executor.last_statement().as_deref(),
            Some("SELECT count(*) AS count FROM \"orders\" WHERE total > 10")
        );
    }

    #[tokio::test]
    async fn test_exists_defaults_to_false_without_rows() {
        let (ctx, _) = recording_context();
        let result = ExistsTool.execute(json!({"table": "orders"}), &ctx).await.unwrap();
        assert_eq!(result["exists"], false);
    }
}

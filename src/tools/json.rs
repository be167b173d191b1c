//! JSONB tools: extract, set, keys and containment.

use crate::define_tool;
use crate::error::Result;
use crate::protocol::Tool;
use crate::tools::parse_args;
use crate::tools::registry::{ToolContext, ToolHandler};
use crate::tools::sql::{jsonb_literal, parse_json_path, quote_ident, text_array_literal};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

const GROUP: &str = "json";

fn where_and(filter: Option<&str>, extra: Option<String>) -> String {
    let conditions: Vec<String> = filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| format!("({})", f))
        .into_iter()
        .chain(extra)
        .collect();

    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtractArgs {
    pub table: String,
    pub column: String,
    pub path: Value,
    #[serde(default, rename = "where")]
    pub filter: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ExtractArgs {
    fn build_sql(&self) -> Result<String> {
        let path = text_array_literal(&parse_json_path(&self.path)?);
        Ok(format!(
            "SELECT {} #> {} AS value FROM {}{}",
            quote_ident(&self.column)?,
            path,
            quote_ident(&self.table)?,
            where_and(self.filter.as_deref(), None)
        ))
    }
}

pub struct JsonExtractTool;

#[async_trait]
impl ToolHandler for JsonExtractTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_json_extract",
            description: "Extract the value at a JSON path from a jsonb column.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "column": { "type": "string" },
                    "path": {
                        "description": "Path as 'a.b.0', '$.a.b' or an array of segments",
                        "oneOf": [{ "type": "string" }, { "type": "array" }]
                    },
                    "where": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1 }
                },
                "required": ["table", "column", "path"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_json_extract"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ExtractArgs = parse_args(arguments)?;
        let result = ctx.query(&args.build_sql()?, args.limit).await?;
        let values: Vec<_> = result
            .rows
            .into_iter()
            .filter_map(|mut row| row.remove("value"))
            .collect();
        Ok(json!({ "values": values, "count": values.len() }))
    }
}

#[derive(Debug, Deserialize)]
pub struct SetArgs {
    pub table: String,
    pub column: String,
    pub path: Value,
    pub value: Value,
    #[serde(default, rename = "where")]
    pub filter: Option<String>,
    #[serde(default = "default_create_missing", alias = "createMissing")]
    pub create_missing: bool,
}

fn default_create_missing() -> bool {
    true
}

impl SetArgs {
    fn build_sql(&self) -> Result<String> {
        let column = quote_ident(&self.column)?;
        let path = text_array_literal(&parse_json_path(&self.path)?);
        Ok(format!(
            "UPDATE {} SET {col} = jsonb_set(COALESCE({col}, '{{}}'::jsonb), {}, {}, {})",
            quote_ident(&self.table)?,
            path,
            jsonb_literal(&self.value),
            self.create_missing,
            col = column
        ) + &where_and(self.filter.as_deref(), None))
    }
}

pub struct JsonSetTool;

#[async_trait]
impl ToolHandler for JsonSetTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_json_set",
            description: "Set the value at a JSON path in a jsonb column (jsonb_set).",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "column": { "type": "string" },
                    "path": { "oneOf": [{ "type": "string" }, { "type": "array" }] },
                    "value": { "description": "Any JSON value" },
                    "where": { "type": "string", "description": "Rows to update (default: all)" },
                    "create_missing": { "type": "boolean", "description": "Default: true" }
                },
                "required": ["table", "column", "path", "value"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_json_set"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: SetArgs = parse_args(arguments)?;
        let rows_affected = ctx.execute(&args.build_sql()?).await?;
        Ok(json!({ "rows_affected": rows_affected }))
    }
}

#[derive(Debug, Deserialize)]
pub struct KeysArgs {
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub path: Option<Value>,
    #[serde(default, rename = "where")]
    pub filter: Option<String>,
}

impl KeysArgs {
    fn build_sql(&self) -> Result<String> {
        let column = quote_ident(&self.column)?;
        let target = match &self.path {
            Some(path) => format!("{} #> {}", column, text_array_literal(&parse_json_path(path)?)),
            None => column,
        };
        Ok(format!(
            "SELECT DISTINCT jsonb_object_keys({t}) AS key FROM {}{} ORDER BY key",
            quote_ident(&self.table)?,
            where_and(
                self.filter.as_deref(),
                Some(format!("jsonb_typeof({t}) = 'object'", t = target))
            ),
            t = target
        ))
    }
}

pub struct JsonKeysTool;

#[async_trait]
impl ToolHandler for JsonKeysTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_json_keys",
            description: "List the distinct top-level keys of a jsonb column, or of the object at a path.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "column": { "type": "string" },
                    "path": { "oneOf": [{ "type": "string" }, { "type": "array" }] },
                    "where": { "type": "string" }
                },
                "required": ["table", "column"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_json_keys"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: KeysArgs = parse_args(arguments)?;
        let result = ctx.query(&args.build_sql()?, None).await?;
        let keys: Vec<_> = result
            .rows
            .into_iter()
            .filter_map(|mut row| row.remove("key"))
            .collect();
        Ok(json!({ "keys": keys }))
    }
}

#[derive(Debug, Deserialize)]
pub struct ContainsArgs {
    pub table: String,
    pub column: String,
    pub value: Value,
    #[serde(default, rename = "where")]
    pub filter: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ContainsArgs {
    fn build_sql(&self) -> Result<String> {
        let containment = format!("{} @> {}", quote_ident(&self.column)?, jsonb_literal(&self.value));
        Ok(format!(
            "SELECT * FROM {}{}",
            quote_ident(&self.table)?,
            where_and(self.filter.as_deref(), Some(containment))
        ))
    }
}

pub struct JsonContainsTool;

#[async_trait]
impl ToolHandler for JsonContainsTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_json_contains",
            description: "Find rows whose jsonb column contains the given JSON value (@>).",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "column": { "type": "string" },
                    "value": { "description": "JSON value the column must contain" },
                    "where": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1 }
                },
                "required": ["table", "column", "value"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_json_contains"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ContainsArgs = parse_args(arguments)?;
        let result = ctx.query(&args.build_sql()?, args.limit.or(Some(100))).await?;
        Ok(serde_json::to_value(result)?)
    }
}

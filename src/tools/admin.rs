//! Maintenance tools: VACUUM, ANALYZE and REINDEX.

use crate::define_tool;
use crate::error::Result;
use crate::protocol::Tool;
use crate::tools::parse_args;
use crate::tools::registry::{ToolContext, ToolHandler};
use crate::tools::sql::quote_ident;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

const GROUP: &str = "admin";

#[derive(Debug, Default, Deserialize)]
pub struct VacuumArgs {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub full: bool,
    #[serde(default)]
    pub analyze: bool,
    #[serde(default)]
    pub verbose: bool,
}

impl VacuumArgs {
    fn build_sql(&self) -> Result<String> {
        let options: Vec<&str> = [
            (self.full, "FULL"),
            (self.analyze, "ANALYZE"),
            (self.verbose, "VERBOSE"),
        ]
        .into_iter()
        .filter_map(|(enabled, option)| enabled.then_some(option))
        .collect();

        let mut sql = String::from("VACUUM");
        if !options.is_empty() {
            sql.push_str(&format!(" ({})", options.join(", ")));
        }
        if let Some(table) = &self.table {
            sql.push(' ');
            sql.push_str(&quote_ident(table)?);
        }
        Ok(sql)
    }
}

pub struct VacuumTool;

#[async_trait]
impl ToolHandler for VacuumTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_vacuum",
            description: "Reclaim storage with VACUUM, for one table or the whole database. \
                FULL rewrites the table and takes an exclusive lock.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string", "description": "Table to vacuum (default: all)" },
                    "full": { "type": "boolean" },
                    "analyze": { "type": "boolean", "description": "Also update planner statistics" },
                    "verbose": { "type": "boolean" }
                }
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_vacuum"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: VacuumArgs = parse_args(arguments)?;
        let sql = args.build_sql()?;
        ctx.execute(&sql).await?;
        info!("Executed {}", sql);
        Ok(json!({ "success": true, "sql": sql }))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeArgs {
    #[serde(default)]
    pub table: Option<String>,
}

impl AnalyzeArgs {
    fn build_sql(&self) -> Result<String> {
        Ok(match &self.table {
            Some(table) => format!("ANALYZE {}", quote_ident(table)?),
            None => "ANALYZE".to_string(),
        })
    }
}

pub struct AnalyzeTool;

#[async_trait]
impl ToolHandler for AnalyzeTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_analyze",
            description: "Update planner statistics for one table or the whole database.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" }
                }
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_analyze"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: AnalyzeArgs = parse_args(arguments)?;
        let sql = args.build_sql()?;
        ctx.execute(&sql).await?;
        Ok(json!({ "success": true, "sql": sql }))
    }
}

#[derive(Debug, Deserialize)]
pub struct ReindexArgs {
    pub table: String,
    #[serde(default)]
    pub concurrently: bool,
}

impl ReindexArgs {
    fn build_sql(&self) -> Result<String> {
        Ok(format!(
            "REINDEX TABLE {}{}",
            if self.concurrently { "CONCURRENTLY " } else { "" },
            quote_ident(&self.table)?
        ))
    }
}

pub struct ReindexTool;

#[async_trait]
impl ToolHandler for ReindexTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_reindex",
            description: "Rebuild every index of a table.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "concurrently": { "type": "boolean", "description": "Rebuild without blocking writes" }
                },
                "required": ["table"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_reindex"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: ReindexArgs = parse_args(arguments)?;
        let sql = args.build_sql()?;
        ctx.execute(&sql).await?;
        info!("Executed {}", sql);
        Ok(json!({ "success": true, "sql": sql }))
    }
}

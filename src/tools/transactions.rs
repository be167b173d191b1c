//! Atomic multi-statement execution.

use crate::define_tool;
use crate::error::{Result, ToolError};
use crate::protocol::Tool;
use crate::tools::parse_args;
use crate::tools::registry::{ToolContext, ToolHandler};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
pub struct TransactionArgs {
    pub statements: Vec<Statement>,
}

/// A statement given either as plain SQL or as `{ "sql": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Statement {
    Sql(String),
    Object { sql: String },
}

impl Statement {
    fn into_sql(self) -> String {
        match self {
            Self::Sql(sql) | Self::Object { sql } => sql,
        }
    }
}

impl TransactionArgs {
    fn into_statements(self) -> Result<Vec<String>> {
        let statements: Vec<String> = self
            .statements
            .into_iter()
            .map(Statement::into_sql)
            .filter(|sql| !sql.trim().is_empty())
            .collect();

        if statements.is_empty() {
            return Err(ToolError::InvalidArguments("At least one statement is required".into()).into());
        }
        Ok(statements)
    }
}

pub struct TransactionExecuteTool;

#[async_trait]
impl ToolHandler for TransactionExecuteTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_transaction_execute",
            description: "Execute several statements in one transaction. \
                Any failure rolls back every statement.",
            schema: {
                "type": "object",
                "properties": {
                    "statements": {
                        "type": "array",
                        "items": {
                            "oneOf": [
                                { "type": "string" },
                                {
                                    "type": "object",
                                    "properties": { "sql": { "type": "string" } },
                                    "required": ["sql"]
                                }
                            ]
                        }
                    }
                },
                "required": ["statements"]
            }
        )
    }

    fn group(&self) -> &'static str {
        "transactions"
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_transaction_execute"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: TransactionArgs = parse_args(arguments)?;
        let statements = args.into_statements()?;

        let rows_affected = ctx.transaction(&statements).await?;
        info!("Committed transaction with {} statements", statements.len());

        Ok(json!({
            "success": true,
            "statements": statements.len(),
            "rows_affected": rows_affected,
        }))
    }
}

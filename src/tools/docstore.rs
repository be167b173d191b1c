//! Document store on top of jsonb: each collection is a table with an
//! `id`, a `doc` jsonb column and a creation timestamp.

use crate::define_tool;
use crate::error::{Result, ToolError};
use crate::protocol::Tool;
use crate::tools::parse_args;
use crate::tools::registry::{ToolContext, ToolHandler};
use crate::tools::sql::{jsonb_literal, quote_ident, split_qualified};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

const GROUP: &str = "docstore";
const DEFAULT_FIND_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct CollectionArgs {
    pub collection: String,
}

impl CollectionArgs {
    fn create_statements(&self) -> Result<Vec<String>> {
        let table = quote_ident(&self.collection)?;
        let (_, name) = split_qualified(&self.collection);
        Ok(vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {} (id bigserial PRIMARY KEY, doc jsonb NOT NULL, \
                 created_at timestamptz NOT NULL DEFAULT now())",
                table
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} USING gin (doc)",
                quote_ident(&format!("idx_{}_doc", name))?,
                table
            ),
        ])
    }

    fn drop_sql(&self) -> Result<String> {
        Ok(format!("DROP TABLE IF EXISTS {}", quote_ident(&self.collection)?))
    }
}

pub struct CreateCollectionTool;

#[async_trait]
impl ToolHandler for CreateCollectionTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_doc_create_collection",
            description: "Create a document collection (a table with a GIN-indexed jsonb column).",
            schema: {
                "type": "object",
                "properties": {
                    "collection": { "type": "string" }
                },
                "required": ["collection"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_doc_create_collection"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: CollectionArgs = parse_args(arguments)?;
        let statements = args.create_statements()?;
        ctx.transaction(&statements).await?;
        Ok(json!({ "success": true, "collection": args.collection }))
    }
}

pub struct DropCollectionTool;

#[async_trait]
impl ToolHandler for DropCollectionTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_doc_drop_collection",
            description: "Drop a document collection and all of its documents.",
            schema: {
                "type": "object",
                "properties": {
                    "collection": { "type": "string" }
                },
                "required": ["collection"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_doc_drop_collection"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: CollectionArgs = parse_args(arguments)?;
        ctx.execute(&args.drop_sql()?).await?;
        Ok(json!({ "success": true, "collection": args.collection }))
    }
}

#[derive(Debug, Deserialize)]
pub struct InsertArgs {
    pub collection: String,
    #[serde(alias = "document")]
    pub documents: Value,
}

impl InsertArgs {
    fn build_sql(&self) -> Result<String> {
        let documents: Vec<&Value> = match &self.documents {
            Value::Array(items) => items.iter().collect(),
            single @ Value::Object(_) => vec![single],
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "Documents must be objects, got: {}",
                    other
                ))
                .into());
            }
        };

        if documents.is_empty() {
            return Err(ToolError::InvalidArguments("At least one document is required".into()).into());
        }
        if let Some(bad) = documents.iter().find(|doc| !doc.is_object()) {
            return Err(ToolError::InvalidArguments(format!("Documents must be objects, got: {}", bad)).into());
        }

        let values = documents
            .iter()
            .map(|doc| format!("({})", jsonb_literal(doc)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "INSERT INTO {} (doc) VALUES {} RETURNING id",
            quote_ident(&self.collection)?,
            values
        ))
    }
}

pub struct InsertTool;

#[async_trait]
impl ToolHandler for InsertTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_doc_insert",
            description: "Insert one document or an array of documents into a collection; returns the new ids.",
            schema: {
                "type": "object",
                "properties": {
                    "collection": { "type": "string" },
                    "documents": {
                        "oneOf": [
                            { "type": "object" },
                            { "type": "array", "items": { "type": "object" } }
                        ]
                    }
                },
                "required": ["collection", "documents"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_doc_insert"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: InsertArgs = parse_args(arguments)?;
        let result = ctx.query(&args.build_sql()?, None).await?;
        let ids: Vec<_> = result
            .rows
            .into_iter()
            .filter_map(|mut row| row.remove("id"))
            .collect();
        debug!("Inserted {} documents into {}", ids.len(), args.collection);
        Ok(json!({ "inserted": ids.len(), "ids": ids }))
    }
}

#[derive(Debug, Deserialize)]
pub struct FindArgs {
    pub collection: String,
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl FindArgs {
    fn build_sql(&self) -> Result<String> {
        let filter = match &self.filter {
            None | Some(Value::Null) => String::new(),
            Some(filter @ Value::Object(map)) if !map.is_empty() => {
                format!(" WHERE doc @> {}", jsonb_literal(filter))
            }
            Some(Value::Object(_)) => String::new(),
            Some(other) => {
                return Err(ToolError::InvalidArguments(format!("Filter must be an object, got: {}", other)).into());
            }
        };
        Ok(format!(
            "SELECT id, doc, created_at FROM {}{} ORDER BY id",
            quote_ident(&self.collection)?,
            filter
        ))
    }
}

pub struct FindTool;

#[async_trait]
impl ToolHandler for FindTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_doc_find",
            description: "Find documents in a collection matching a containment filter.",
            schema: {
                "type": "object",
                "properties": {
                    "collection": { "type": "string" },
                    "filter": { "type": "object", "description": "Documents must contain this object" },
                    "limit": { "type": "integer", "minimum": 1 }
                },
                "required": ["collection"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_doc_find"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: FindArgs = parse_args(arguments)?;
        let result = ctx
            .query(&args.build_sql()?, Some(args.limit.unwrap_or(DEFAULT_FIND_LIMIT)))
            .await?;
        Ok(json!({
            "documents": result.rows,
            "count": result.row_count,
            "truncated": result.truncated.unwrap_or(false),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::recording_context;

    #[tokio::test]
    async fn test_create_collection_runs_in_one_transaction() {
        let (ctx, executor) = recording_context();
        CreateCollectionTool
            .execute(json!({"collection": "events"}), &ctx)
            .await
            .unwrap();

        let statements = executor.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS \"events\" (id bigserial"));
        assert_eq!(
            statements[1],
            "CREATE INDEX IF NOT EXISTS \"idx_events_doc\" ON \"events\" USING gin (doc)"
        );
    }

    #[test]
    fn test_insert_sql() {
        let args: InsertArgs = serde_json::from_value(json!({
            "collection": "events",
            "documents": [{"kind": "click"}, {"kind": "view"}]
        }))
        .unwrap();
        assert_eq!(
            args.build_sql().unwrap(),
            "INSERT INTO \"events\" (doc) VALUES ('{\"kind\":\"click\"}'::jsonb), \
             ('{\"kind\":\"view\"}'::jsonb) RETURNING id"
        );
    }

    #[test]
    fn test_insert_rejects_scalars() {
        let args: InsertArgs =
            serde_json::from_value(json!({"collection": "events", "documents": [1, 2]})).unwrap();
        assert!(args.build_sql().is_err());
    }

    #[test]
    fn test_find_sql() {
        let args: FindArgs = serde_json::from_value(json!({
            "collection": "events", "filter": {"kind": "click"}
        }))
        .unwrap();
        assert_eq!(
            args.build_sql().unwrap(),
            "SELECT id, doc, created_at FROM \"events\" WHERE doc @> '{\"kind\":\"click\"}'::jsonb ORDER BY id"
        );

        let all: FindArgs = serde_json::from_value(json!({"collection": "events", "filter": {}})).unwrap();
        assert!(!all.build_sql().unwrap().contains("WHERE"));
    }
}

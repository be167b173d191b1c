//! Full-text search over one or more text columns.

use crate::define_tool;
use crate::error::{Result, ToolError};
use crate::protocol::Tool;
use crate::tools::registry::{ToolContext, ToolHandler};
use crate::tools::sql::{quote_ident, quote_literal, split_qualified};
use crate::tools::{OneOrMany, parse_args};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

const GROUP: &str = "fulltext";
const DEFAULT_LANGUAGE: &str = "english";

/// `to_tsvector(config, coalesce(a, '') || ' ' || coalesce(b, ''))`
fn tsvector(language: &str, columns: &[String]) -> Result<String> {
    if columns.is_empty() {
        return Err(ToolError::InvalidArguments("At least one column is required".into()).into());
    }
    let document = columns
        .iter()
        .map(|c| quote_ident(c).map(|quoted| format!("coalesce({}, '')", quoted)))
        .collect::<Result<Vec<_>>>()?
        .join(" || ' ' || ");
    Ok(format!("to_tsvector({}, {})", quote_literal(language), document))
}

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub table: String,
    pub columns: OneOrMany,
    pub query: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl SearchArgs {
    fn build_sql(&self) -> Result<String> {
        let language = self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
        let vector = tsvector(language, &self.columns.to_vec())?;
        let query = format!("plainto_tsquery({}, {})", quote_literal(language), quote_literal(&self.query));
        Ok(format!(
            "SELECT *, ts_rank({v}, {q}) AS rank FROM {} WHERE {v} @@ {q} ORDER BY rank DESC",
            quote_ident(&self.table)?,
            v = vector,
            q = query
        ))
    }
}

pub struct FulltextSearchTool;

#[async_trait]
impl ToolHandler for FulltextSearchTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_fulltext_search",
            description: "Search text columns with PostgreSQL full-text search, ranked by relevance.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "columns": { "oneOf": [{ "type": "string" }, { "type": "array", "items": { "type": "string" } }] },
                    "query": { "type": "string", "description": "Plain-text search terms" },
                    "language": { "type": "string", "description": "Text search configuration (default: english)" },
                    "limit": { "type": "integer", "minimum": 1 }
                },
                "required": ["table", "columns", "query"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_fulltext_search"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: SearchArgs = parse_args(arguments)?;
        let result = ctx.query(&args.build_sql()?, args.limit.or(Some(50))).await?;
        Ok(serde_json::to_value(result)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateIndexArgs {
    pub table: String,
    pub columns: OneOrMany,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl CreateIndexArgs {
    fn index_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            let (_, table) = split_qualified(&self.table);
            format!("idx_{}_fts", table)
        })
    }

    fn build_sql(&self) -> Result<String> {
        let language = self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
        Ok(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING gin ({})",
            quote_ident(&self.index_name())?,
            quote_ident(&self.table)?,
            tsvector(language, &self.columns.to_vec())?
        ))
    }
}

pub struct FulltextCreateIndexTool;

#[async_trait]
impl ToolHandler for FulltextCreateIndexTool {
    fn definition(&self) -> Tool {
        define_tool!(
            name: "pg_fulltext_create_index",
            description: "Create a GIN index over the tsvector of one or more text columns.",
            schema: {
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "columns": { "oneOf": [{ "type": "string" }, { "type": "array", "items": { "type": "string" } }] },
                    "name": { "type": "string", "description": "Index name (default: idx_<table>_fts)" },
                    "language": { "type": "string" }
                },
                "required": ["table", "columns"]
            }
        )
    }

    fn group(&self) -> &'static str {
        GROUP
    }

    #[instrument(skip(self, arguments, ctx), fields(tool = "pg_fulltext_create_index"))]
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let args: CreateIndexArgs = parse_args(arguments)?;
        let sql = args.build_sql()?;
        ctx.execute(&sql).await?;
        Ok(json!({ "success": true, "index": args.index_name(), "sql": sql }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_sql() {
        let args: SearchArgs = serde_json::from_value(json!({
            "table": "articles", "columns": ["title", "body"], "query": "rust's async"
        }))
        .unwrap();
        let sql = args.build_sql().unwrap();

        assert!(sql.contains(
            "to_tsvector('english', coalesce(\"title\", '') || ' ' || coalesce(\"body\", ''))"
        ));
        assert!(sql.contains("plainto_tsquery('english', 'rust''s async')"));
        assert!(sql.ends_with("ORDER BY rank DESC"));
    }

    #[test]
    fn test_create_index_sql() {
        let args: CreateIndexArgs = serde_json::from_value(json!({
            "table": "public.articles", "columns": "body", "language": "simple"
        }))
        .unwrap();
        assert_eq!(
            args.build_sql().unwrap(),
            "CREATE INDEX IF NOT EXISTS \"idx_articles_fts\" ON \"public\".\"articles\" \
             USING gin (to_tsvector('simple', coalesce(\"body\", '')))"
        );
    }

    #[test]
    fn test_search_requires_columns() {
        let args: SearchArgs = serde_json::from_value(json!({
            "table": "articles", "columns": [], "query": "x"
        }))
        .unwrap();
        assert!(args.build_sql().is_err());
    }
}

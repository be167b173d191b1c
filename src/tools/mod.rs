//! PostgreSQL tool catalog and registry.
//!
//! Every tool is tagged with a group (`core`, `transactions`, `json`,
//! `fulltext`, `performance`, `admin`, `docstore`); the code-mode API is
//! synthesized from these tags and the `pg_` tool names.

pub mod admin;
pub mod docstore;
pub mod fulltext;
pub mod json;
pub mod performance;
pub mod query;
pub mod registry;
pub mod sql;
pub mod transactions;

pub use registry::{
    CallOrigin, ContextProvider, ToolContext, ToolDescriptor, ToolHandler, ToolRegistry,
};

use crate::error::{Result, ToolError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize tool arguments, mapping failures to [`ToolError::InvalidArguments`].
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()).into())
}

/// A single name or a list of names.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(name) => vec![name.clone()],
            Self::Many(names) => names.clone(),
        }
    }
}

/// Create the registry with the full catalog, in group order.
pub fn create_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(query::ReadQueryTool);
    registry.register(query::WriteQueryTool);
    registry.register(query::ListTablesTool);
    registry.register(query::ListSchemasTool);
    registry.register(query::DescribeTableTool);
    registry.register(query::CreateTableTool);
    registry.register(query::DropTableTool);
    registry.register(query::CreateIndexTool);
    registry.register(query::CountTool);
    registry.register(query::ExistsTool);

    registry.register(transactions::TransactionExecuteTool);

    registry.register(json::JsonExtractTool);
    registry.register(json::JsonSetTool);
    registry.register(json::JsonKeysTool);
    registry.register(json::JsonContainsTool);

    registry.register(fulltext::FulltextSearchTool);
    registry.register(fulltext::FulltextCreateIndexTool);

    registry.register(performance::ExplainTool);
    registry.register(performance::IndexStatsTool);
    registry.register(performance::TableStatsTool);
    registry.register(performance::CacheHitRatioTool);

    registry.register(admin::VacuumTool);
    registry.register(admin::AnalyzeTool);
    registry.register(admin::ReindexTool);

    registry.register(docstore::CreateCollectionTool);
    registry.register(docstore::DropCollectionTool);
    registry.register(docstore::InsertTool);
    registry.register(docstore::FindTool);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::McpError;
    use serde_json::json;

    #[test]
    fn test_catalog_names_are_prefixed_and_grouped() {
        let registry = create_registry();
        assert_eq!(registry.len(), 28);

        for descriptor in registry.descriptors() {
            assert!(descriptor.name.starts_with("pg_"), "{}", descriptor.name);
            assert_eq!(descriptor.definition.input_schema["type"], "object");
        }
        assert_eq!(registry.get("pg_transaction_execute").unwrap().group, "transactions");
        assert_eq!(registry.get("pg_doc_find").unwrap().group, "docstore");
    }

    #[test]
    fn test_parse_args_reports_invalid_arguments() {
        let result: Result<query::ReadQueryArgs> = parse_args(json!({"limit": 5}));
        assert!(matches!(result, Err(McpError::Tool(ToolError::InvalidArguments(_)))));
    }

    #[test]
    fn test_one_or_many() {
        let one: OneOrMany = serde_json::from_value(json!("id")).unwrap();
        let many: OneOrMany = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(one.to_vec(), vec!["id"]);
        assert_eq!(many.to_vec(), vec!["a", "b"]);
    }
}

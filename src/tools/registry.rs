//! Tool registry and the handler contract shared by both call surfaces.

use crate::database::{QueryExecutor, QueryResult};
use crate::error::{McpError, Result, ToolError};
use crate::protocol::{CallToolParams, Tool};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Which surface a tool call arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOrigin {
    /// `tools/call` on the protocol surface.
    Protocol,
    /// A method on the code-mode API.
    CodeMode,
}

/// Per-call context handed to every tool handler.
#[derive(Clone)]
pub struct ToolContext {
    pub request_id: u64,
    pub origin: CallOrigin,
    pub query_timeout: Duration,
    executor: Arc<dyn QueryExecutor>,
}

impl ToolContext {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            request_id: 0,
            origin: CallOrigin::Protocol,
            query_timeout: Duration::from_secs(30),
            executor,
        }
    }

    pub fn with_request_id(mut self, request_id: u64) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_origin(mut self, origin: CallOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    pub async fn query(&self, sql: &str, limit: Option<u32>) -> Result<QueryResult> {
        self.executor
            .query(sql, limit, self.query_timeout)
            .await
            .map_err(McpError::from)
    }

    pub async fn execute(&self, sql: &str) -> Result<u64> {
        self.executor
            .execute(sql, self.query_timeout)
            .await
            .map_err(McpError::from)
    }

    pub async fn transaction(&self, statements: &[String]) -> Result<Vec<u64>> {
        self.executor
            .transaction(statements, self.query_timeout)
            .await
            .map_err(McpError::from)
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("request_id", &self.request_id)
            .field("origin", &self.origin)
            .field("query_timeout", &self.query_timeout)
            .field("executor", &self.executor.name())
            .finish()
    }
}

/// Source of invocation contexts, owned by the surrounding server.
pub trait ContextProvider: Send + Sync {
    fn tool_context(&self, origin: CallOrigin) -> ToolContext;
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> Tool;

    /// Domain group the tool belongs to (e.g. "core", "json").
    fn group(&self) -> &'static str;

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value>;
}

/// A registered tool: unique name, group tag and handler.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub group: String,
    pub definition: Tool,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(handler: Arc<dyn ToolHandler>) -> Self {
        let definition = handler.definition();
        Self {
            name: definition.name.clone(),
            group: handler.group().to_string(),
            definition,
            handler,
        }
    }

    pub async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        self.handler.execute(arguments, ctx).await
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("group", &self.group)
            .finish()
    }
}

/// Registry preserving registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ToolHandler + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared handler. A repeated name replaces the earlier entry in place.
    pub fn register_arc(&mut self, handler: Arc<dyn ToolHandler>) {
        let descriptor = ToolDescriptor::new(handler);
        debug!("Registering tool: {} ({})", descriptor.name, descriptor.group);

        match self.index.get(&descriptor.name) {
            Some(&position) => {
                warn!("Tool {} registered twice, keeping the latest", descriptor.name);
                self.tools[position] = descriptor;
            }
            None => {
                self.index.insert(descriptor.name.clone(), self.tools.len());
                self.tools.push(descriptor);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn list(&self) -> Vec<Tool> {
        self.tools.iter().map(|d| d.definition.clone()).collect()
    }

    pub async fn execute(&self, params: CallToolParams, ctx: &ToolContext) -> Result<Value> {
        let tool = self
            .get(&params.name)
            .ok_or_else(|| ToolError::NotFound(params.name.clone()))?;

        tool.invoke(params.arguments, ctx).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[macro_export]
macro_rules! define_tool {
    (
        name: $name:expr,
        description: $desc:expr,
        schema: $schema:tt
    ) => {
        $crate::protocol::Tool {
            name: $name.into(),
            description: Some($desc.into()),
            input_schema: serde_json::json!($schema),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoTool, recording_context};
    use serde_json::json;

    #[test]
    fn test_registry_preserves_order() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new("pg_b", "core"));
        registry.register(EchoTool::new("pg_a", "core"));
        registry.register(EchoTool::new("pg_c", "json"));

        assert_eq!(registry.len(), 3);
        let names: Vec<_> = registry.descriptors().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["pg_b", "pg_a", "pg_c"]);
        assert_eq!(registry.get("pg_c").unwrap().group, "json");
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_duplicate_registration_replaces_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new("pg_a", "core"));
        registry.register(EchoTool::new("pg_b", "core"));
        registry.register(EchoTool::new("pg_a", "admin"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.descriptors()[0].group, "admin");
    }

    #[tokio::test]
    async fn test_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new("pg_echo", "core"));
        let (ctx, _) = recording_context();

        let params = CallToolParams {
            name: "pg_echo".into(),
            arguments: json!({"x": 1}),
        };
        let result = registry.execute(params, &ctx).await.unwrap();
        assert_eq!(result["params"], json!({"x": 1}));

        let missing = CallToolParams {
            name: "pg_missing".into(),
            arguments: json!({}),
        };
        assert!(matches!(
            registry.execute(missing, &ctx).await,
            Err(McpError::Tool(ToolError::NotFound(_)))
        ));
    }
}

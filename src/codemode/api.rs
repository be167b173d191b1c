//! Callable per-group APIs synthesized from the tool registry.

use super::aliases::{self, AliasEntry};
use super::groups::classify;
use super::naming::resolve_method_name;
use super::normalize::Normalizer;
use crate::error::{ConfigError, ConfigResult, Result, ToolError};
use crate::tools::{CallOrigin, ContextProvider, ToolDescriptor};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A registry tool bound to its canonical method name.
///
/// Aliases share the same `Arc<BoundMethod>` as their canonical method.
pub struct BoundMethod {
    group: String,
    method: String,
    tool: ToolDescriptor,
    normalizer: Arc<Normalizer>,
    provider: Arc<dyn ContextProvider>,
}

impl BoundMethod {
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Canonical method name.
    pub fn name(&self) -> &str {
        &self.method
    }

    pub fn tool_name(&self) -> &str {
        &self.tool.name
    }

    /// Normalize `args`, obtain a context and run the handler.
    ///
    /// Handler errors are returned as they are.
    #[instrument(skip(self, args), fields(group = %self.group, method = %self.method))]
    pub async fn call(&self, args: Vec<Value>) -> Result<Value> {
        let params = self
            .normalizer
            .normalize(&self.method, args)
            .unwrap_or_else(|| json!({}));
        let ctx = self.provider.tool_context(CallOrigin::CodeMode);
        debug!(tool = %self.tool.name, request_id = ctx.request_id, "Invoking tool");

        self.tool.handler.execute(params, &ctx).await
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod")
            .field("group", &self.group)
            .field("method", &self.method)
            .field("tool", &self.tool.name)
            .finish()
    }
}

/// Methods of one group: canonical names plus materialized aliases.
#[derive(Debug)]
pub struct GroupApi {
    group: String,
    canonical: Vec<String>,
    aliases: Vec<String>,
    methods: HashMap<String, Arc<BoundMethod>>,
}

impl GroupApi {
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Look up a canonical method or alias.
    pub fn get(&self, name: &str) -> Option<&Arc<BoundMethod>> {
        self.methods.get(name)
    }

    /// Canonical method names in registry order.
    pub fn method_names(&self) -> &[String] {
        &self.canonical
    }

    /// Materialized aliases in alias-table order.
    pub fn alias_names(&self) -> &[String] {
        &self.aliases
    }

    /// Number of callable names, aliases included.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Build the API of one group.
///
/// Canonical name collisions keep the first tool, and aliases whose target
/// is missing or whose name is already taken are dropped. With `strict`
/// both cases are reported as [`ConfigError`] instead.
pub fn build_group_api(
    group: &str,
    descriptors: &[ToolDescriptor],
    provider: &Arc<dyn ContextProvider>,
    normalizer: &Arc<Normalizer>,
    alias_entries: &[AliasEntry],
    strict: bool,
) -> ConfigResult<GroupApi> {
    let mut api = GroupApi {
        group: group.to_string(),
        canonical: Vec::with_capacity(descriptors.len()),
        aliases: Vec::new(),
        methods: HashMap::with_capacity(descriptors.len()),
    };

    for descriptor in descriptors {
        let method = resolve_method_name(&descriptor.name, group);
        if api.methods.contains_key(&method) {
            if strict {
                return Err(ConfigError::DuplicateMethod {
                    group: group.to_string(),
                    method,
                });
            }
            debug!(group, method = %method, tool = %descriptor.name, "Duplicate method name, keeping the first tool");
            continue;
        }

        let bound = Arc::new(BoundMethod {
            group: group.to_string(),
            method: method.clone(),
            tool: descriptor.clone(),
            normalizer: Arc::clone(normalizer),
            provider: Arc::clone(provider),
        });
        api.canonical.push(method.clone());
        api.methods.insert(method, bound);
    }

    for entry in alias_entries.iter().filter(|e| e.group == group) {
        let Some(target) = api.methods.get(entry.canonical).cloned() else {
            if strict {
                return Err(ConfigError::AliasTarget {
                    group: group.to_string(),
                    alias: entry.alias.to_string(),
                    canonical: entry.canonical.to_string(),
                });
            }
            debug!(group, alias = entry.alias, canonical = entry.canonical, "Dropping alias without target");
            continue;
        };

        if api.methods.contains_key(entry.alias) {
            if strict {
                return Err(ConfigError::DuplicateMethod {
                    group: group.to_string(),
                    method: entry.alias.to_string(),
                });
            }
            debug!(group, alias = entry.alias, "Alias shadows an existing method, skipping");
            continue;
        }

        api.aliases.push(entry.alias.to_string());
        api.methods.insert(entry.alias.to_string(), target);
    }

    Ok(api)
}

/// The full code-mode API: one [`GroupApi`] per registry group.
#[derive(Debug, Default)]
pub struct CodeModeApi {
    groups: BTreeMap<String, GroupApi>,
}

impl CodeModeApi {
    pub fn builder(provider: Arc<dyn ContextProvider>) -> CodeModeApiBuilder {
        CodeModeApiBuilder::new(provider)
    }

    pub fn get(&self, group: &str, method: &str) -> Option<&Arc<BoundMethod>> {
        self.groups.get(group)?.get(method)
    }

    /// Canonical method names of a group.
    pub fn list_methods(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(GroupApi::method_names)
    }

    pub fn group(&self, group: &str) -> Option<&GroupApi> {
        self.groups.get(group)
    }

    /// Groups in name order.
    pub fn groups(&self) -> impl Iterator<Item = &GroupApi> {
        self.groups.values()
    }

    pub async fn call(&self, group: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let bound = self
            .get(group, method)
            .ok_or_else(|| ToolError::NotFound(format!("{}.{}", group, method)))?;
        bound.call(args).await
    }
}

/// Builder for [`CodeModeApi`].
pub struct CodeModeApiBuilder {
    provider: Arc<dyn ContextProvider>,
    normalizer: Arc<Normalizer>,
    aliases: Vec<AliasEntry>,
    strict: bool,
}

impl CodeModeApiBuilder {
    pub fn new(provider: Arc<dyn ContextProvider>) -> Self {
        Self {
            provider,
            normalizer: Normalizer::standard(),
            aliases: aliases::ALIASES.to_vec(),
            strict: false,
        }
    }

    pub fn normalizer(mut self, normalizer: Arc<Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn aliases(mut self, aliases: Vec<AliasEntry>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Classify `descriptors` and build every group.
    pub fn build(self, descriptors: &[ToolDescriptor]) -> ConfigResult<CodeModeApi> {
        let mut groups = BTreeMap::new();
        for (group, tools) in classify(descriptors) {
            let api = build_group_api(
                &group,
                &tools,
                &self.provider,
                &self.normalizer,
                &self.aliases,
                self.strict,
            )?;
            groups.insert(group, api);
        }

        debug!(
            groups = groups.len(),
            methods = groups.values().map(GroupApi::len).sum::<usize>(),
            "Built code-mode API"
        );
        Ok(CodeModeApi { groups })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DatabaseError, McpError};
    use crate::testing::{EchoTool, FailingTool, RecordingProvider};
    use crate::tools::{ToolHandler, create_registry};

    fn descriptor<T: ToolHandler + 'static>(tool: T) -> ToolDescriptor {
        ToolDescriptor::new(Arc::new(tool))
    }

    fn provider() -> Arc<dyn ContextProvider> {
        RecordingProvider::new()
    }

    fn entry(group: &'static str, alias: &'static str, canonical: &'static str) -> AliasEntry {
        AliasEntry {
            group,
            alias,
            canonical,
        }
    }

    #[test]
    fn test_alias_shares_canonical_method() {
        let descriptors = vec![descriptor(EchoTool::new("pg_read_query", "core"))];
        let api = build_group_api(
            "core",
            &descriptors,
            &provider(),
            &Normalizer::standard(),
            &[entry("core", "query", "readQuery")],
            false,
        )
        .unwrap();

        let canonical = api.get("readQuery").unwrap();
        let alias = api.get("query").unwrap();
        assert!(Arc::ptr_eq(canonical, alias));
        assert_eq!(api.method_names(), ["readQuery"]);
        assert_eq!(api.alias_names(), ["query"]);
    }

    #[test]
    fn test_alias_without_target_is_dropped() {
        let descriptors = vec![descriptor(EchoTool::new("pg_read_query", "core"))];
        let aliases = [entry("core", "truncate", "truncateTable")];
        let api = build_group_api("core", &descriptors, &provider(), &Normalizer::standard(), &aliases, false)
            .unwrap();

        assert!(api.get("truncate").is_none());
        assert_eq!(api.len(), 1);
    }

    #[test]
    fn test_strict_mode_rejects_dangling_alias() {
        let descriptors = vec![descriptor(EchoTool::new("pg_read_query", "core"))];
        let aliases = [entry("core", "truncate", "truncateTable")];
        let result = build_group_api("core", &descriptors, &provider(), &Normalizer::standard(), &aliases, true);

        assert!(matches!(result, Err(ConfigError::AliasTarget { ref alias, .. }) if alias == "truncate"));
    }

    #[test]
    fn test_duplicate_method_names() {
        let descriptors = vec![
            descriptor(EchoTool::new("pg_json_extract", "json")),
            descriptor(EchoTool::new("pg_extract", "json")),
        ];

        let lenient = build_group_api("json", &descriptors, &provider(), &Normalizer::standard(), &[], false)
            .unwrap();
        assert_eq!(lenient.get("extract").unwrap().tool_name(), "pg_json_extract");

        let strict = build_group_api("json", &descriptors, &provider(), &Normalizer::standard(), &[], true);
        assert!(matches!(strict, Err(ConfigError::DuplicateMethod { .. })));
    }

    #[test]
    fn test_alias_never_shadows_canonical() {
        let descriptors = vec![
            descriptor(EchoTool::new("pg_read_query", "core")),
            descriptor(EchoTool::new("pg_write_query", "core")),
        ];
        let aliases = [entry("core", "writeQuery", "readQuery")];
        let api = build_group_api("core", &descriptors, &provider(), &Normalizer::standard(), &aliases, false)
            .unwrap();

        assert_eq!(api.get("writeQuery").unwrap().tool_name(), "pg_write_query");
    }

    #[tokio::test]
    async fn test_call_normalizes_and_uses_code_mode_context() {
        let provider = RecordingProvider::new();
        let descriptors = vec![descriptor(EchoTool::new("pg_count", "core"))];
        let api = CodeModeApi::builder(provider.clone()).build(&descriptors).unwrap();

        let result = api.call("core", "count", vec![json!("orders")]).await.unwrap();
        assert_eq!(result["tool"], "pg_count");
        assert_eq!(result["params"], json!({"table": "orders"}));
        assert_eq!(provider.issued(), 1);

        let empty = api.call("core", "count", vec![]).await.unwrap();
        assert_eq!(empty["params"], json!({}));
    }

    #[tokio::test]
    async fn test_handler_errors_propagate_unchanged() {
        let descriptors = vec![descriptor(FailingTool::new("pg_vacuum", "admin"))];
        let api = CodeModeApi::builder(provider()).build(&descriptors).unwrap();

        let result = api.call("admin", "vacuum", vec![json!("orders")]).await;
        assert!(matches!(
            result,
            Err(McpError::Database(DatabaseError::QueryFailed(ref m))) if m == "pg_vacuum failed"
        ));
    }

    #[tokio::test]
    async fn test_unknown_method_is_not_found() {
        let api = CodeModeApi::builder(provider()).build(&[]).unwrap();
        assert!(matches!(
            api.call("core", "missing", vec![]).await,
            Err(McpError::Tool(ToolError::NotFound(_)))
        ));
    }

    #[test]
    fn test_standard_catalog_builds_in_strict_mode() {
        let registry = create_registry();
        let api = CodeModeApi::builder(provider())
            .strict(true)
            .build(registry.descriptors())
            .unwrap();

        let groups: Vec<_> = api.groups().map(GroupApi::group).collect();
        assert_eq!(
            groups,
            vec!["admin", "core", "docstore", "fulltext", "json", "performance", "transactions"]
        );
        assert_eq!(
            api.list_methods("docstore").unwrap(),
            ["createCollection", "dropCollection", "insert", "find"]
        );
        assert_eq!(
            api.list_methods("fulltext").unwrap(),
            ["fulltextSearch", "fulltextCreateIndex"]
        );
        assert!(Arc::ptr_eq(
            api.get("transactions", "batch").unwrap(),
            api.get("transactions", "execute").unwrap()
        ));
        // Every alias in the table resolves against the real catalog.
        for alias in aliases::ALIASES {
            assert!(api.get(alias.group, alias.alias).is_some(), "{}", alias.alias);
        }
    }

    #[test]
    fn test_standard_tables_name_existing_methods() {
        let registry = create_registry();
        let api = CodeModeApi::builder(provider()).build(registry.descriptors()).unwrap();
        let all: Vec<&String> = api.groups().flat_map(|g| g.method_names()).collect();

        for method in Normalizer::standard().methods() {
            assert!(all.iter().any(|m| m.as_str() == method), "{}", method);
        }
    }
}

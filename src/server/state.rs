//! Server state management.

use crate::codemode::{CodeModeApi, SandboxBindings};
use crate::config::ServerConfig;
use crate::database::{DisconnectedExecutor, QueryExecutor};
use crate::error::{McpError, Result};
use crate::protocol::ClientInfo;
use crate::tools::{CallOrigin, ContextProvider, ToolContext, ToolRegistry};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Hands out tool contexts sharing one executor and one request counter.
pub struct ToolContextFactory {
    executor: Arc<dyn QueryExecutor>,
    query_timeout: Duration,
    next_id: AtomicU64,
}

impl ToolContextFactory {
    pub fn new(executor: Arc<dyn QueryExecutor>, query_timeout: Duration) -> Self {
        Self {
            executor,
            query_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    /// Contexts issued so far.
    pub fn issued(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst) - 1
    }
}

impl ContextProvider for ToolContextFactory {
    fn tool_context(&self, origin: CallOrigin) -> ToolContext {
        let request_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        ToolContext::new(Arc::clone(&self.executor))
            .with_request_id(request_id)
            .with_origin(origin)
            .with_query_timeout(self.query_timeout)
    }
}

pub struct ServerState {
    pub config: ServerConfig,
    pub tools: ToolRegistry,
    bindings: Option<SandboxBindings>,
    contexts: Arc<ToolContextFactory>,
    initialized: AtomicBool,
    client_info: RwLock<Option<ClientInfo>>,
}

impl ServerState {
    pub fn builder() -> ServerStateBuilder {
        ServerStateBuilder::new()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_initialized(&self, client_info: ClientInfo) {
        *self.client_info.write() = Some(client_info);
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.client_info.read().clone()
    }

    /// Code-mode bindings; `None` when code mode is disabled.
    pub fn bindings(&self) -> Option<&SandboxBindings> {
        self.bindings.as_ref()
    }

    pub fn context(&self, origin: CallOrigin) -> ToolContext {
        self.contexts.tool_context(origin)
    }

    pub fn request_count(&self) -> u64 {
        self.contexts.issued()
    }

    pub fn is_connected(&self) -> bool {
        self.contexts.executor().name() != "disconnected"
    }

    pub fn executor_name(&self) -> &'static str {
        self.contexts.executor().name()
    }
}

pub struct ServerStateBuilder {
    config: Option<ServerConfig>,
    executor: Option<Arc<dyn QueryExecutor>>,
    tools: Option<ToolRegistry>,
}

impl ServerStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            executor: None,
            tools: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Replace the built-in tool catalog.
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Build the state and, when enabled, the code-mode bindings over the registry.
    ///
    /// # Errors
    ///
    /// In strict code mode, returns [`McpError::Config`] when the alias or
    /// method tables disagree with the registry.
    pub fn build(self) -> Result<ServerState> {
        let config = self.config.unwrap_or_default();
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(DisconnectedExecutor));
        let tools = self.tools.unwrap_or_else(crate::tools::create_registry);

        let contexts = Arc::new(ToolContextFactory::new(
            executor,
            config.database.query_timeout,
        ));

        let bindings = if config.codemode.enabled {
            let provider: Arc<dyn ContextProvider> = contexts.clone();
            let api = CodeModeApi::builder(provider)
                .strict(config.codemode.strict)
                .build(tools.descriptors())
                .map_err(McpError::Config)?;
            info!(
                groups = api.groups().count(),
                strict = config.codemode.strict,
                "Code-mode API built"
            );
            Some(SandboxBindings::build(api))
        } else {
            debug!("Code mode disabled");
            None
        };

        Ok(ServerState {
            config,
            tools,
            bindings,
            contexts,
            initialized: AtomicBool::new(false),
            client_info: RwLock::new(None),
        })
    }
}

impl Default for ServerStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodeModeConfig;
    use crate::error::ConfigError;
    use crate::testing::{EchoTool, RecordingExecutor};

    #[test]
    fn test_factory_numbers_contexts() {
        let factory = ToolContextFactory::new(Arc::new(DisconnectedExecutor), Duration::from_secs(5));

        let first = factory.tool_context(CallOrigin::Protocol);
        let second = factory.tool_context(CallOrigin::CodeMode);

        assert_eq!(first.request_id, 1);
        assert_eq!(second.request_id, 2);
        assert_eq!(second.origin, CallOrigin::CodeMode);
        assert_eq!(second.query_timeout, Duration::from_secs(5));
        assert_eq!(factory.issued(), 2);
    }

    #[test]
    fn test_default_state_is_disconnected_with_codemode() {
        let state = ServerState::builder().build().unwrap();

        assert!(!state.is_connected());
        assert!(!state.is_initialized());
        assert_eq!(state.tools.len(), crate::tools::create_registry().len());
        assert!(state.bindings().unwrap().api().group("core").is_some());
    }

    #[test]
    fn test_codemode_can_be_disabled() {
        let config = ServerConfig::builder()
            .codemode(CodeModeConfig {
                enabled: false,
                strict: false,
            })
            .build();
        let state = ServerState::builder().config(config).build().unwrap();
        assert!(state.bindings().is_none());
    }

    #[test]
    fn test_strict_build_reports_duplicate_methods() {
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool::new("pg_read_query", "core"));
        tools.register(EchoTool::new("pg_core_read_query", "core"));

        let strict = ServerConfig::builder()
            .codemode(CodeModeConfig {
                enabled: true,
                strict: true,
            })
            .build();

        let result = ServerState::builder().config(strict).tools(tools).build();
        assert!(matches!(
            result,
            Err(McpError::Config(ConfigError::DuplicateMethod { .. }))
        ));
    }

    #[test]
    fn test_context_uses_configured_executor() {
        let executor = Arc::new(RecordingExecutor::default());
        let state = ServerState::builder().executor(executor).build().unwrap();

        let ctx = state.context(CallOrigin::Protocol);
        assert_eq!(ctx.executor().name(), "recording");
        assert!(state.is_connected());
        assert_eq!(state.request_count(), 1);
    }
}

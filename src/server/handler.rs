//! MCP request handler implementation.

use crate::codemode::SandboxBindings;
use crate::codemode::usage::SANDBOX_ROOT;
use crate::error::{McpError, ProtocolError, ProtocolResult, ToolError};
use crate::protocol::{
    CallToolParams, CallToolResult, CodeModeCallParams, CodeModeHelpParams, Handler,
    InitializeParams, InitializeResult, ListToolsResult, MCP_VERSION, ServerCapabilities,
    ServerInfo,
};
use crate::server::state::ServerState;
use crate::tools::CallOrigin;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

/// MCP request handler that processes protocol messages.
pub struct McpHandler {
    state: Arc<ServerState>,
}

impl McpHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    fn bindings(&self, method: &str) -> ProtocolResult<&SandboxBindings> {
        self.state
            .bindings()
            .ok_or_else(|| ProtocolError::MethodNotFound(method.to_string()))
    }

    fn instructions(&self) -> String {
        let mut groups: Vec<&str> = Vec::new();
        for descriptor in self.state.tools.descriptors() {
            if !groups.contains(&descriptor.group.as_str()) {
                groups.push(&descriptor.group);
            }
        }

        let connection = if self.state.is_connected() {
            format!(
                "connected to {} at {}:{}",
                self.state.config.database.database,
                self.state.config.database.host,
                self.state.config.database.port
            )
        } else {
            "not connected; tools that touch the database will fail".to_string()
        };

        let mut text = format!(
            "PostgreSQL MCP server ({}). {} tools in groups: {}.",
            connection,
            self.state.tools.len(),
            groups.join(", ")
        );
        if self.state.bindings().is_some() {
            text.push_str(&format!(
                " Code mode: call codemode/help for the {root} API, then codemode/call \
                 with a path such as '{root}.core.readQuery' and positional args.",
                root = SANDBOX_ROOT
            ));
        }
        text
    }
}

fn tool_result(result: crate::error::Result<Value>) -> CallToolResult {
    match result {
        Ok(value) => CallToolResult::json(&value),
        Err(e) => {
            error!("Tool execution error: {}", e);
            CallToolResult::error(e.to_string())
        }
    }
}

#[async_trait]
impl Handler for McpHandler {
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult> {
        info!(
            "Initialize request from {} v{}",
            params.client_info.name, params.client_info.version
        );
        debug!("Client capabilities: {:?}", params.capabilities);

        self.state.set_initialized(params.client_info);

        let mut capabilities = ServerCapabilities::default().with_tools();
        if self.state.bindings().is_some() {
            capabilities = capabilities.with_codemode(SANDBOX_ROOT);
        }

        Ok(InitializeResult {
            protocol_version: MCP_VERSION.into(),
            capabilities,
            server_info: ServerInfo {
                name: self.state.config.name.to_string(),
                version: self.state.config.version.to_string(),
            },
            instructions: Some(self.instructions()),
        })
    }

    async fn initialized(&self) -> ProtocolResult<()> {
        info!("Server initialized successfully");
        Ok(())
    }

    async fn shutdown(&self) -> ProtocolResult<()> {
        info!(requests = self.state.request_count(), "Shutdown request received");
        Ok(())
    }

    async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
        let tools = self.state.tools.list();
        debug!("Listing {} tools", tools.len());

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(&self, params: CallToolParams) -> ProtocolResult<CallToolResult> {
        debug!("Tool call: {}", params.name);
        let ctx = self.state.context(CallOrigin::Protocol);
        Ok(tool_result(self.state.tools.execute(params, &ctx).await))
    }

    async fn codemode_help(&self, params: CodeModeHelpParams) -> ProtocolResult<Value> {
        let bindings = self.bindings("codemode/help")?;
        match bindings.describe(params.path.as_deref()) {
            Ok(help) => Ok(help),
            Err(McpError::Tool(ToolError::NotFound(path))) => Err(ProtocolError::InvalidParams(
                format!("Unknown code-mode path: {}", path).into(),
            )),
            Err(e) => Err(ProtocolError::InternalError(e.to_string().into())),
        }
    }

    async fn codemode_call(&self, params: CodeModeCallParams) -> ProtocolResult<CallToolResult> {
        debug!("Code-mode call: {}", params.path);
        let bindings = self.bindings("codemode/call")?;
        Ok(tool_result(bindings.invoke(&params.path, params.args).await))
    }
}

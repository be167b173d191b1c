//! Serving loop: reads requests from a transport, gates them on the protocol
//! lifecycle and writes the dispatcher's answers back.
//!
//! Capabilities are not configured here; the [`Handler`] reports them from
//! `initialize`.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::handler::{Dispatcher, Handler};
use crate::protocol::transport::{StdioTransport, Transport};
use crate::protocol::types::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, Message, ServerInfo,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Protocol lifecycle of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Waiting for `initialize`.
    Created,
    /// `initialize` answered, `initialized` not yet seen.
    Initializing,
    Running,
    /// `shutdown` answered; nothing further is read.
    ShuttingDown,
    Stopped,
}

impl Lifecycle {
    /// Whether `method` may be served in this state.
    pub fn admits(self, method: &str) -> bool {
        match self {
            Self::Created => matches!(method, "initialize" | "ping"),
            Self::Initializing | Self::Running => true,
            Self::ShuttingDown | Self::Stopped => false,
        }
    }

    /// State after `method` has been served.
    pub fn advance(self, method: &str) -> Self {
        match (self, method) {
            (Self::Created, "initialize") => Self::Initializing,
            (Self::Initializing, "initialized") => Self::Running,
            (Self::Initializing | Self::Running, "shutdown") => Self::ShuttingDown,
            (state, _) => state,
        }
    }
}

pub struct McpServer<H: Handler> {
    info: ServerInfo,
    dispatcher: Dispatcher<H>,
    lifecycle: RwLock<Lifecycle>,
}

impl<H: Handler> McpServer<H> {
    pub fn new(handler: H, info: ServerInfo) -> Self {
        Self {
            info,
            dispatcher: Dispatcher::new(Arc::new(handler)),
            lifecycle: RwLock::new(Lifecycle::Created),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read()
    }

    /// Serve over stdin/stdout until EOF or `shutdown`.
    #[instrument(skip(self), fields(server = %self.info.name))]
    pub async fn run(&self) -> Result<()> {
        self.run_with_transport(&StdioTransport::stdio()).await
    }

    pub async fn run_with_transport<T: Transport>(&self, transport: &T) -> Result<()> {
        info!("Starting MCP server: {} v{}", self.info.name, self.info.version);

        while self.lifecycle() != Lifecycle::ShuttingDown {
            let request = match transport.read_message().await {
                Ok(Some(Message::Request(request))) => request,
                Ok(Some(Message::Response(response))) => {
                    warn!("Unexpected response received: {:?}", response.id);
                    continue;
                }
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    break;
                }
                Err(McpError::Protocol(ProtocolError::ParseError)) => {
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    if let Err(e) = transport.write_response(&response).await {
                        error!("Failed to send error response: {}", e);
                    }
                    continue;
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    break;
                }
            };

            if let Some(response) = self.serve(request).await
                && let Err(e) = transport.write_response(&response).await
            {
                error!("Failed to send response: {}", e);
            }
        }

        *self.lifecycle.write() = Lifecycle::Stopped;
        info!("Server stopped");
        Ok(())
    }

    /// Answer one request; `None` for notifications.
    async fn serve(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let state = self.lifecycle();
        let is_notification = request.is_notification();

        let response = if state.admits(&request.method) {
            let method = request.method.clone();
            let response = self.dispatcher.dispatch(request).await;

            let next = state.advance(&method);
            if next != state {
                debug!(from = ?state, to = ?next, "Lifecycle change");
                *self.lifecycle.write() = next;
            }
            response
        } else {
            warn!(method = %request.method, state = ?state, "Request before initialize");
            let err = ProtocolError::NotInitialized;
            JsonRpcResponse::error(request.id, JsonRpcError::new(err.code(), err.to_string()))
        };

        (!is_notification).then_some(response)
    }
}

/// Builder for [`McpServer`].
pub struct McpServerBuilder<H: Handler> {
    handler: Option<H>,
    name: String,
    version: String,
}

impl<H: Handler> McpServerBuilder<H> {
    pub fn new() -> Self {
        Self {
            handler: None,
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn build(self) -> Result<McpServer<H>> {
        let handler = self.handler.ok_or_else(|| McpError::Internal {
            message: "Handler is required".into(),
        })?;

        Ok(McpServer::new(
            handler,
            ServerInfo {
                name: self.name,
                version: self.version,
            },
        ))
    }
}

impl<H: Handler> Default for McpServerBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

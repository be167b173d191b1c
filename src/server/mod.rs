//! MCP server implementation: shared state and the protocol handler.

pub mod handler;
pub mod state;

pub use handler::McpHandler;
pub use state::{ServerState, ServerStateBuilder, ToolContextFactory};

//! MCP server exposing PostgreSQL tools twice: as plain MCP tools and as a
//! grouped, camel-case code-mode API (`pg.core.readQuery(...)`).
//!
//! # Example
//!
//! ```no_run
//! use pg_codemode_mcp::{
//!     config::{DatabaseConfigBuilder, ServerConfig},
//!     database::create_executor,
//!     protocol::McpServerBuilder,
//!     server::{McpHandler, ServerState},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let database = DatabaseConfigBuilder::new().from_env()?.build()?;
//!     let executor = create_executor(&database).await?;
//!
//!     let config = ServerConfig::builder().database(database).build();
//!     let state = Arc::new(ServerState::builder().config(config).executor(executor).build()?);
//!
//!     let server = McpServerBuilder::new()
//!         .handler(McpHandler::new(state))
//!         .build()?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod codemode;
pub mod config;
pub mod database;
pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use codemode::{CodeModeApi, SandboxBindings};
pub use config::{CodeModeConfig, DatabaseConfig, DatabaseConfigBuilder, ServerConfig};
pub use database::{DisconnectedExecutor, QueryExecutor, create_executor};
pub use error::{McpError, Result};
pub use protocol::{McpServer, McpServerBuilder};
pub use server::{McpHandler, ServerState, ServerStateBuilder};
pub use tools::{ToolRegistry, create_registry};

//! MCP server binary entry point.

use anyhow::Result;
use pg_codemode_mcp::{
    config::{CodeModeConfig, DatabaseConfig, DatabaseConfigBuilder, ServerConfig},
    database::{DisconnectedExecutor, QueryExecutor, create_executor},
    protocol::McpServerBuilder,
    server::{McpHandler, ServerState},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let database = DatabaseConfigBuilder::new().from_env()?.build()?;
    let codemode = CodeModeConfig::from_env()?;
    let executor = connect(&database).await;

    let config = ServerConfig::builder()
        .database(database)
        .codemode(codemode.clone())
        .build();

    let state = Arc::new(
        ServerState::builder()
            .config(config)
            .executor(executor)
            .build()?,
    );

    info!(
        tools = state.tools.len(),
        codemode = codemode.enabled,
        executor = state.executor_name(),
        "Server state initialized"
    );

    let server = McpServerBuilder::new()
        .handler(McpHandler::new(state))
        .name(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .build()?;

    info!("MCP server ready, waiting for connections...");

    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Connect when the environment names a database; otherwise, or on failure,
/// serve against a disconnected executor.
async fn connect(config: &DatabaseConfig) -> Arc<dyn QueryExecutor> {
    let configured =
        std::env::var("DATABASE_URL").is_ok() || std::env::var("DATABASE_HOST").is_ok();

    if !configured {
        warn!("No DATABASE_URL or DATABASE_HOST set; database tools will report not connected");
        return Arc::new(DisconnectedExecutor);
    }

    info!(
        "Connecting to PostgreSQL at {}:{}/{}",
        config.host, config.port, config.database
    );

    match create_executor(config).await {
        Ok(executor) => {
            info!("Connected to {} on {}", config.database, config.host);
            executor
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            warn!("Server will start without a database connection");
            Arc::new(DisconnectedExecutor)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pg_codemode_mcp=info,warn"));

    // stdout carries the protocol
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
        .init();
}

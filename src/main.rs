//! Kusto MCP Server entry point.
//!
//! Serves MCP over stdio. Logs go to stderr because stdout carries JSON-RPC.

use anyhow::Result;
use kusto_mcp_server::shutdown::{install_signal_handlers, ShutdownController};
use kusto_mcp_server::{Config, KustoMcpServer};
use rmcp::ServiceExt;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!(
        "Kusto MCP Server v{} starting (transport: stdio)",
        env!("CARGO_PKG_VERSION")
    );

    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] {}", info);
    }));

    let config = Config::from_env()?;
    let shutdown_controller = Arc::new(ShutdownController::new(config.shutdown_drain_timeout));
    install_signal_handlers(shutdown_controller.clone());

    let server = KustoMcpServer::new(config)?;
    let kusto = server.service().clone();
    match server.current_target() {
        Some((cluster, database)) => info!("Restored connection to {} / {}", cluster, database),
        None => info!("No active connection; waiting for `connect`"),
    }

    let service = server.serve(rmcp::transport::stdio()).await?;
    let mut shutdown_signal = shutdown_controller.signal();

    tokio::select! {
        quit_reason = service.waiting() => {
            match quit_reason {
                Ok(reason) => info!("Service stopped: {:?}", reason),
                Err(e) => error!("Service error: {}", e),
            }
        }
        _ = shutdown_signal.recv() => {
            info!("Shutdown signal received");
        }
    }

    shutdown_controller.graceful_shutdown(&kusto).await;
    info!("Server shutdown complete");

    Ok(())
}

/// Logs MUST go to stderr because stdout is used for JSON-RPC communication.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,kusto_mcp_server=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

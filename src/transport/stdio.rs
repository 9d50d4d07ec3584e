//! Stdio transport for the MCP server.
//!
//! This transport uses standard input/output for communication,
//! which is the standard mode for CLI-based MCP integrations.
//! Logs must go to stderr so they never interleave with protocol frames.

use crate::db::QueryGateway;
use crate::error::{DbError, DbResult};
use crate::mcp::{ConnectDefaults, GatewayService};
use crate::transport::{Transport, close_gateway, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::{info, warn};

/// Stdio transport implementation.
///
/// Reads JSON-RPC messages from stdin and writes responses to stdout.
pub struct StdioTransport {
    gateway: Arc<QueryGateway>,
    defaults: ConnectDefaults,
}

impl StdioTransport {
    pub fn new(gateway: Arc<QueryGateway>, defaults: ConnectDefaults) -> Self {
        Self { gateway, defaults }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = GatewayService::new(self.gateway.clone(), self.defaults);
        let running_service = service
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        close_gateway(&self.gateway).await;
                        return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        close_gateway(&self.gateway).await;

        if shutdown_requested {
            // stdin reads block and cannot be interrupted by select!
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkPolicy;
    use crate::db::SqlxDriver;

    #[test]
    fn test_stdio_transport_creation() {
        let gateway = Arc::new(QueryGateway::new(
            Arc::new(SqlxDriver::new()),
            ChunkPolicy::default(),
        ));
        let transport = StdioTransport::new(gateway, ConnectDefaults::default());
        assert_eq!(transport.name(), "stdio");
    }
}

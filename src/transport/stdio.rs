//! Stdio transport for the MCP server.
//!
//! JSON-RPC messages are read from stdin and written to stdout, so nothing
//! else may write to stdout while this transport runs.

use crate::error::{DbError, DbResult};
use crate::mcp::SqlAgentService;
use crate::tools::SqlToolkit;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::{info, warn};

pub struct StdioTransport {
    toolkit: Arc<SqlToolkit>,
}

impl StdioTransport {
    pub fn new(toolkit: Arc<SqlToolkit>) -> Self {
        Self { toolkit }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = SqlAgentService::new(self.toolkit.clone());
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
                        self.toolkit.close().await;
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

        info!("Closing database connections");
        self.toolkit.close().await;

        if shutdown_requested {
            // A pending stdin read cannot be cancelled
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
    use crate::db::DbPool;
    use crate::tools::ToolkitOptions;

    #[tokio::test]
    async fn test_stdio_transport_creation() {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        let toolkit = SqlToolkit::new(DbPool::SQLite(pool), ToolkitOptions::default()).unwrap();
        let transport = StdioTransport::new(Arc::new(toolkit));
        assert_eq!(transport.name(), "stdio");
    }
}

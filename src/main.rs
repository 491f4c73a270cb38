//! SQL Agent Tools - Main entry point.
//!
//! Connects to one database and serves the SQL tools over MCP.

use clap::Parser;
use sql_agent_tools::config::{Config, TransportMode};
use sql_agent_tools::db::DbPool;
use sql_agent_tools::models::ConnectionConfig;
use sql_agent_tools::tools::{SqlToolkit, ToolkitOptions};
use sql_agent_tools::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    info!(
        transport = %config.transport,
        locale = %config.locale,
        "Starting SQL Agent Tools v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db_config = config.parse_database()?;
    let conn_config = ConnectionConfig::from_database_config(&db_config)?;

    let pool = DbPool::connect(&conn_config, config.connect_timeout_duration()).await?;
    if let Some(version) = pool.server_version().await {
        info!(version = %version, "Database ready");
    }

    let options = ToolkitOptions {
        writable: conn_config.writable,
        query_timeout: config.query_timeout_duration(),
        row_limit: config.row_limit,
        sample_rows: config.sample_rows,
        locale: config.locale,
    };
    let toolkit = Arc::new(SqlToolkit::new(pool, options)?);

    let result = match config.transport {
        TransportMode::Stdio => StdioTransport::new(toolkit).run().await,
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                toolkit,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

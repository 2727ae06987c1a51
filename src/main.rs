//! IoTDB MCP Server - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) tools for AI assistants
//! to run read-only queries against Apache IoTDB and export the results.

use iotdb_mcp_server::config::{Config, TransportMode};
use iotdb_mcp_server::db::{PoolOptions, QueryDispatcher, RestConnector, SessionPool};
use iotdb_mcp_server::mcp::IotdbService;
use iotdb_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber. Logs go to stderr; stdout carries MCP messages.
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
    let config = Config::parse_args();
    init_tracing(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    info!(
        transport = %config.transport,
        dialect = %config.sql_dialect,
        host = %config.host,
        port = config.port,
        "Starting IoTDB MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    std::fs::create_dir_all(&config.export_path).map_err(|e| {
        error!(path = %config.export_path.display(), error = %e, "Cannot create export directory");
        e
    })?;

    // Sessions are opened lazily on first use
    let connector = RestConnector::from_config(&config)?;
    let pool = SessionPool::new(Arc::new(connector), PoolOptions::from_config(&config));
    let dispatcher = QueryDispatcher::from_config(pool, &config)?;
    let service = IotdbService::from_config(dispatcher, &config);

    let result = match config.transport {
        TransportMode::Stdio => StdioTransport::new(service).run().await,
        TransportMode::Http => {
            info!(
                bind = %config.http_bind_addr(),
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                service,
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

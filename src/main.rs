//! ClickHouse MCP Server - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) tools for AI assistants
//! to explore and query a ClickHouse server.

use clap::Parser;
use clickhouse_mcp_server::config::{Config, TransportMode};
use clickhouse_mcp_server::db::{CatalogClient, ClickHouseClient, CursorCache, QueryExecutor};
use clickhouse_mcp_server::mcp::ClickHouseService;
use clickhouse_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so they never mix with stdio transport messages.
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
    // Parse configuration from command line and environment
    let config = Config::parse();

    init_tracing(&config);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        eprintln!();
        eprintln!("Usage: clickhouse-mcp-server --url <http(s)://host:port> [--user <name>] [--password <secret>]");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  clickhouse-mcp-server --url http://localhost:8123");
        eprintln!("  CLICKHOUSE_URL=https://ch.example.com:8443 CLICKHOUSE_USER=reader clickhouse-mcp-server");
        eprintln!("  clickhouse-mcp-server --transport http --http-port 8000");
        std::process::exit(1);
    }

    info!(
        transport = %config.transport,
        "Starting ClickHouse MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let settings = config.clickhouse_settings()?;
    info!(
        url = %settings.url,
        user = %settings.user,
        database = ?settings.database,
        verify = settings.verify,
        "Configured ClickHouse connection"
    );
    let catalog: Arc<dyn CatalogClient> = Arc::new(ClickHouseClient::new(settings)?);

    let cursors = Arc::new(CursorCache::with_limits(
        config.cursor_cache_capacity,
        config.cursor_ttl_duration(),
    ));

    info!(
        capacity = cursors.capacity(),
        ttl_secs = cursors.ttl().as_secs(),
        "Cursor cache ready"
    );

    // Start the sweeper for expired pagination cursors
    CursorCache::start_cleanup_task(cursors.clone(), config.cursor_sweep_interval_duration());

    let executor = Arc::new(QueryExecutor::with_limits(
        catalog.clone(),
        config.query_pool_size,
        config.query_timeout_duration(),
    ));
    info!(
        pool_size = executor.pool_size(),
        timeout_secs = executor.default_timeout().as_secs(),
        "Query executor ready"
    );

    let service =
        ClickHouseService::with_page_size(catalog, cursors, executor, config.page_size);

    // Run the appropriate transport
    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            let transport = StdioTransport::new(service);
            transport.run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                service,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            );
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

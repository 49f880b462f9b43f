//! HTTP transport with Streamable HTTP support for the MCP server.
//!
//! This transport uses HTTP with SSE streaming responses,
//! which is suitable for web-based MCP integrations. It also serves
//! `GET /health` for load balancers and orchestrators.

use crate::db::client::{CatalogClient, server_version};
use crate::error::{DbError, DbResult};
use crate::mcp::ClickHouseService;
use crate::transport::{Transport, wait_for_signal};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// HTTP transport implementation with Streamable HTTP support.
///
/// This transport provides:
/// - HTTP endpoints for MCP protocol messages
/// - Server-Sent Events for streaming responses
/// - Session management for stateful connections
/// - A health endpoint that checks the ClickHouse connection
pub struct HttpTransport {
    service: ClickHouseService,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        service: ClickHouseService,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            service,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the MCP endpoint path.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn router(&self) -> axum::Router {
        let template = self.service.clone();
        let mcp_service = StreamableHttpService::new(
            move || Ok(template.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        let router = axum::Router::new()
            .route(HEALTH_PATH, get(health_check))
            .with_state(self.service.catalog().clone());

        // nest_service doesn't support the root path
        if self.endpoint == "/" {
            router.fallback_service(mcp_service)
        } else {
            router.nest_service(&self.endpoint, mcp_service)
        }
    }
}

/// Report whether ClickHouse answers `SELECT version()`.
pub async fn health_check(
    State(catalog): State<Arc<dyn CatalogClient>>,
) -> (StatusCode, String) {
    match server_version(catalog.as_ref()).await {
        Ok(version) => (
            StatusCode::OK,
            format!("OK - Connected to ClickHouse {}", version),
        ),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("ERROR - Cannot connect to ClickHouse: {}", e),
            )
        }
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting MCP server with HTTP transport on {}", bind_addr);

        let app = self.router();

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;

        info!(endpoint = %self.endpoint, health = HEALTH_PATH, "MCP endpoint ready");

        // SSE connections may keep the server alive indefinitely,
        // so force exit after a timeout once shutdown is requested
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(DbError::internal(format!(
                            "HTTP server error: {}",
                            e
                        )));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {
                // Timeout or second signal reached - server will be dropped
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

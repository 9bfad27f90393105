//! REST API implementation
//!
//! This module provides the HTTP API for AIMetrics.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::monitor::Monitor;

/// HTTP API server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(monitor: Monitor, prometheus: Option<PrometheusHandle>) -> Self {
        Self {
            state: AppState {
                monitor,
                prometheus,
            },
        }
    }

    /// Start the HTTP server
    pub async fn serve(self, addr: &str) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = create_router(self.state)
            .layer(TraceLayer::new_for_http())
            .layer(cors);

        let listener = TcpListener::bind(addr).await?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::Error::Internal(e.to_string()))?;

        Ok(())
    }
}

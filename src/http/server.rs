//! HTTP server setup.
//!
//! # Responsibilities
//! - Wrap the lifecycle router with transport-level middleware
//!   (request ID, tracing, timeout)
//! - Bind server to listener
//! - Stop accepting and drain on shutdown
//!
//! # Design Decisions
//! - Timeouts and disconnects are handled here, never by the envelopes
//! - Middleware stays outside the hook lifecycle

use std::time::Duration;

use axum::http::{HeaderName, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::routing::LifecycleRouter;

/// Header carrying the per-request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// HTTP server for a lifecycle router.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server from a configured lifecycle router.
    pub fn new(router: LifecycleRouter, config: &ServerConfig) -> Self {
        let router = Self::build_router(router.into_router(), config);
        Self { router }
    }

    /// Add the transport middleware layers.
    fn build_router(router: Router, config: &ServerConfig) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        router
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.dispatch.request_timeout_secs),
            ))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router with middleware applied.
    pub fn router(&self) -> &Router {
        &self.router
    }
}

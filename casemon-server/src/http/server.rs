//! Axum server setup
//!
//! Server skeleton with:
//! - Tracing middleware
//! - Per-request timeout
//! - Graceful shutdown on SIGTERM/Ctrl+C, then pool shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::routes;
use crate::db::{ConnectionSource, LeaseGuard, PoolManager};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:8000)
    pub bind_addr: SocketAddr,

    /// Upper bound on a single request, lease included (default: 30s)
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Shared application state
pub struct AppState<S> {
    pub db: LeaseGuard<S>,
    /// Expected webhook bearer token; `None` rejects every delivery.
    pub webhook_token: Option<String>,
}

impl<S: ConnectionSource> AppState<S> {
    pub fn new(source: S, webhook_token: Option<String>) -> Self {
        Self {
            db: LeaseGuard::new(source),
            webhook_token,
        }
    }
}

/// Build the application router.
pub fn build_router<S: ConnectionSource>(state: AppState<S>, request_timeout: Duration) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::ingest::router())
        .merge(routes::webhook::router())
        .layer(request_timeout_layer(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Requests outliving `timeout` are answered with 408.
fn request_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Run the HTTP server until a shutdown signal, then close the pool.
///
/// # Example
///
/// ```ignore
/// let pool = PoolManager::new(DbConfig::from_env()?);
/// pool.initialize().await?;
/// run_server(pool, None, ServerConfig::default()).await?;
/// ```
pub async fn run_server(
    pool: PoolManager,
    webhook_token: Option<String>,
    config: ServerConfig,
) -> Result<(), ServerError> {
    if webhook_token.is_none() {
        tracing::warn!("WEBHOOK_TOKEN not set; all webhook deliveries will be rejected");
    }

    let state = AppState::new(pool.clone(), webhook_token);
    let app = build_router(state, config.request_timeout);

    // Bind listener
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Health check endpoint

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::db::{ConnectionSource, ManagedConnection};
use crate::http::error::ApiError;
use crate::http::server::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// GET /health - lease a connection and run `SELECT 1`
async fn health<S: ConnectionSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<HealthResponse>, ApiError> {
    state
        .db
        .with_connection(|conn| conn.ping())
        .await
        .map_err(ApiError::Unhealthy)?;

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
    }))
}

/// Health routes
pub fn router<S: ConnectionSource>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/health", get(health::<S>))
}

//! Transaction ingestion endpoint

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use casemon_core::format_timestamp;
use serde::{Deserialize, Serialize};

use crate::db::ConnectionSource;
use crate::http::error::ApiError;
use crate::http::extractors::JsonBody;
use crate::http::server::AppState;
use crate::ops;

/// Ingest request
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub ts: String,
    pub status: String,
    #[serde(default)]
    pub auth_code: Option<i64>,
}

/// Ingest response
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub event_ts: String,
    pub status_sent: String,
    pub auth_code: Option<i32>,
}

/// POST /ingest/transaction
async fn ingest_transaction<S: ConnectionSource>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(req): JsonBody<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let event = ops::ingest(&state.db, &req.ts, &req.status, req.auth_code).await?;

    Ok(Json(IngestResponse {
        status: "ok",
        event_ts: format_timestamp(&event.ts),
        status_sent: event.status.to_string(),
        auth_code: event.auth_code.map(|c| c.get()),
    }))
}

/// Ingestion routes
pub fn router<S: ConnectionSource>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/ingest/transaction", post(ingest_transaction::<S>))
}

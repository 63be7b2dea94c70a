//! Grafana alert webhook endpoint

use std::sync::Arc;

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use casemon_core::{format_timestamp, ValidationError};
use serde::Serialize;
use serde_json::Value;

use crate::db::ConnectionSource;
use crate::http::error::ApiError;
use crate::http::extractors::AuthorizationHeader;
use crate::http::server::AppState;
use crate::ops;

/// Webhook response
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub state: String,
    pub event_ts: String,
    pub bucket_ts: String,
    pub reasons: Vec<String>,
    pub severity_score: u8,
}

/// POST /grafana/webhook
///
/// The body is parsed only after the token checks out, so an unauthenticated
/// caller always sees 401 regardless of what it sent.
async fn grafana_webhook<S: ConnectionSource>(
    State(state): State<Arc<AppState<S>>>,
    authorization: AuthorizationHeader,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let secret = state.webhook_token.as_deref();

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            ops::authorize(authorization.as_deref(), secret)?;
            return Err(ValidationError::invalid_payload(e).into());
        }
    };

    let record = ops::record_alert(&state.db, payload, authorization.as_deref(), secret).await?;

    Ok(Json(WebhookResponse {
        status: "ok",
        state: record.state.to_string(),
        event_ts: format_timestamp(&record.event_ts),
        bucket_ts: format_timestamp(&record.bucket_ts),
        reasons: record.reasons,
        severity_score: record.severity_score,
    }))
}

/// Webhook routes
pub fn router<S: ConnectionSource>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/grafana/webhook", post(grafana_webhook::<S>))
}

//! Grafana webhook handling: authorize, derive alert state, upsert.

use casemon_core::{event_timestamp, floor_to_minute, AlertRecord, AlertState};
use chrono::Utc;
use serde_json::Value;
use subtle::ConstantTimeEq;

use super::OpError;
use crate::db::{ConnectionSource, EventStore, LeaseGuard};

/// Check an `Authorization` header against the configured webhook secret.
///
/// Accepts `Bearer <token>` with a case-insensitive scheme and surrounding
/// whitespace trimmed from the token. The token itself is compared
/// case-sensitively in constant time. With no secret configured every
/// request is rejected.
pub fn authorize(header: Option<&str>, secret: Option<&str>) -> Result<(), OpError> {
    let Some(secret) = secret else {
        tracing::warn!("webhook rejected: no WEBHOOK_TOKEN configured");
        return Err(OpError::Unauthorized);
    };

    let Some(token) = header.and_then(bearer_token) else {
        tracing::warn!("webhook rejected: missing or malformed Authorization header");
        return Err(OpError::Unauthorized);
    };

    if bool::from(token.as_bytes().ct_eq(secret.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!("webhook rejected: token mismatch");
        Err(OpError::Unauthorized)
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(char::is_whitespace)?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

/// Record one webhook delivery as an alert row.
///
/// Redelivery of the same `(bucket_ts, state)` overwrites the existing row,
/// so the stored record always matches the most recent delivery.
pub async fn record_alert<S: ConnectionSource>(
    db: &LeaseGuard<S>,
    payload: Value,
    authorization: Option<&str>,
    secret: Option<&str>,
) -> Result<AlertRecord, OpError> {
    authorize(authorization, secret)?;

    let state = AlertState::from_payload(&payload);
    let event_ts = event_timestamp(&payload, Utc::now());

    let record = db
        .with_connection(move |conn| {
            Box::pin(async move {
                let bucket_ts = floor_to_minute(event_ts);
                let snapshot = conn.anomaly_snapshot(bucket_ts).await?;
                let record = AlertRecord::new(event_ts, state, snapshot, payload);
                conn.upsert_alert(&record).await?;
                Ok(record)
            })
        })
        .await?;

    tracing::info!(
        state = %record.state,
        bucket_ts = %record.bucket_ts,
        severity = record.severity_score,
        reasons = ?record.reasons,
        "alert recorded"
    );
    Ok(record)
}

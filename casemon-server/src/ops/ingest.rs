//! Transaction event ingestion.

use casemon_core::TransactionEvent;

use super::OpError;
use crate::db::{ConnectionSource, EventStore, LeaseGuard};

/// Validate one transaction event and append it.
///
/// The transaction row and, when present, the auth-code row are written in
/// the same database transaction and share one timestamp. Nothing is written
/// if validation fails.
pub async fn ingest<S: ConnectionSource>(
    db: &LeaseGuard<S>,
    ts: &str,
    status: &str,
    auth_code: Option<i64>,
) -> Result<TransactionEvent, OpError> {
    let event = TransactionEvent::parse(ts, status, auth_code)?;

    let stored = event.clone();
    db.with_connection(move |conn| {
        Box::pin(async move {
            conn.insert_transaction(&stored).await?;
            if let Some(code) = stored.auth_code {
                conn.insert_auth_code(stored.ts, code).await?;
            }
            Ok(())
        })
    })
    .await?;

    tracing::debug!(
        ts = %event.ts,
        status = %event.status,
        auth_code = ?event.auth_code.map(|c| c.get()),
        "transaction ingested"
    );
    Ok(event)
}

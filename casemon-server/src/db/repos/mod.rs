//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Runs on a single leased connection, inside the lease's transaction
//! - Append-only inserts for events (no read-modify-write)
//! - Handles alert redelivery via ON CONFLICT (no check-then-insert)

pub mod alerts;
pub mod transactions;

use async_trait::async_trait;
use casemon_core::{AlertRecord, AnomalySnapshot, AuthCode, TransactionEvent};
use chrono::{DateTime, Utc};

use super::error::DbError;

pub use alerts::AlertRepo;
pub use transactions::TransactionRepo;

/// Statements the ingestion and alert operations issue on a leased connection.
#[async_trait]
pub trait EventStore: Send {
    /// Append one `transactions` row (`count = 1`).
    async fn insert_transaction(&mut self, event: &TransactionEvent) -> Result<(), DbError>;

    /// Append one `transactions_auth_codes` row (`count = 1`).
    async fn insert_auth_code(&mut self, ts: DateTime<Utc>, code: AuthCode) -> Result<(), DbError>;

    /// Anomaly aggregates for a minute bucket; defaults when the view has no row.
    async fn anomaly_snapshot(&mut self, bucket_ts: DateTime<Utc>) -> Result<AnomalySnapshot, DbError>;

    /// Insert or overwrite the alert keyed by `(bucket_ts, state)`.
    async fn upsert_alert(&mut self, record: &AlertRecord) -> Result<(), DbError>;
}

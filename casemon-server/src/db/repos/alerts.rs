//! Alert repository
//!
//! Reads the externally maintained `v_tx_anomaly` view and upserts
//! `transaction_alerts`:
//! - snapshot: COALESCE so a partially populated bucket reads as zeros
//! - upsert: INSERT ... ON CONFLICT (bucket_ts, state) DO UPDATE, overwriting
//!   every derived field (last write wins)

use casemon_core::{AlertRecord, AnomalySnapshot};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use crate::db::DbError;

/// Row shape of the snapshot query
#[derive(Debug, FromRow)]
struct SnapshotRow {
    denied_above_normal: bool,
    failed_above_normal: bool,
    reversed_above_normal: bool,
    total: i64,
    approved: i64,
    denied: i64,
    failed: i64,
    reversed: i64,
    denied_rate: f64,
    failed_rate: f64,
    reversed_rate: f64,
    denied_mean: Option<f64>,
    denied_std: Option<f64>,
    failed_mean: Option<f64>,
    failed_std: Option<f64>,
    reversed_mean: Option<f64>,
    reversed_std: Option<f64>,
}

impl From<SnapshotRow> for AnomalySnapshot {
    fn from(r: SnapshotRow) -> Self {
        Self {
            denied_above_normal: r.denied_above_normal,
            failed_above_normal: r.failed_above_normal,
            reversed_above_normal: r.reversed_above_normal,
            total: r.total,
            approved: r.approved,
            denied: r.denied,
            failed: r.failed,
            reversed: r.reversed,
            denied_rate: r.denied_rate,
            failed_rate: r.failed_rate,
            reversed_rate: r.reversed_rate,
            denied_mean: r.denied_mean,
            denied_std: r.denied_std,
            failed_mean: r.failed_mean,
            failed_std: r.failed_std,
            reversed_mean: r.reversed_mean,
            reversed_std: r.reversed_std,
        }
    }
}

/// Alert repository
pub struct AlertRepo<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> AlertRepo<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }

    /// Fetch the anomaly snapshot for a bucket.
    ///
    /// A bucket with no row yet is not an error; it reads as the default
    /// snapshot. Casts pin the wire types regardless of how the view
    /// declares its numeric columns.
    pub async fn snapshot(&mut self, bucket_ts: DateTime<Utc>) -> Result<AnomalySnapshot, DbError> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT
              COALESCE(denied_above_normal, false)   AS denied_above_normal,
              COALESCE(failed_above_normal, false)   AS failed_above_normal,
              COALESCE(reversed_above_normal, false) AS reversed_above_normal,
              COALESCE(total, 0)::bigint             AS total,
              COALESCE(approved, 0)::bigint          AS approved,
              COALESCE(denied, 0)::bigint            AS denied,
              COALESCE(failed, 0)::bigint            AS failed,
              COALESCE(reversed, 0)::bigint          AS reversed,
              COALESCE(denied_rate, 0)::float8       AS denied_rate,
              COALESCE(failed_rate, 0)::float8       AS failed_rate,
              COALESCE(reversed_rate, 0)::float8     AS reversed_rate,
              denied_mean::float8   AS denied_mean,
              denied_std::float8    AS denied_std,
              failed_mean::float8   AS failed_mean,
              failed_std::float8    AS failed_std,
              reversed_mean::float8 AS reversed_mean,
              reversed_std::float8  AS reversed_std
            FROM public.v_tx_anomaly
            WHERE ts = $1
            "#,
        )
        .bind(bucket_ts)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(AnomalySnapshot::from).unwrap_or_default())
    }

    /// Insert the alert, or overwrite the existing `(bucket_ts, state)` row.
    pub async fn upsert(&mut self, record: &AlertRecord) -> Result<(), DbError> {
        let s = &record.snapshot;
        let raw_payload = record.raw_payload.to_string();

        sqlx::query(
            r#"
            INSERT INTO public.transaction_alerts (
              bucket_ts, state,
              denied_above_normal, failed_above_normal, reversed_above_normal,
              reasons, severity_score,
              total, approved, denied, failed, reversed,
              denied_rate, failed_rate, reversed_rate,
              denied_mean, denied_std, failed_mean, failed_std, reversed_mean, reversed_std,
              raw_payload
            )
            VALUES (
              $1, $2,
              $3, $4, $5,
              $6, $7,
              $8, $9, $10, $11, $12,
              $13, $14, $15,
              $16, $17, $18, $19, $20, $21,
              $22::jsonb
            )
            ON CONFLICT (bucket_ts, state) DO UPDATE
            SET
              denied_above_normal   = EXCLUDED.denied_above_normal,
              failed_above_normal   = EXCLUDED.failed_above_normal,
              reversed_above_normal = EXCLUDED.reversed_above_normal,
              reasons               = EXCLUDED.reasons,
              severity_score        = EXCLUDED.severity_score,
              total                 = EXCLUDED.total,
              approved              = EXCLUDED.approved,
              denied                = EXCLUDED.denied,
              failed                = EXCLUDED.failed,
              reversed              = EXCLUDED.reversed,
              denied_rate           = EXCLUDED.denied_rate,
              failed_rate           = EXCLUDED.failed_rate,
              reversed_rate         = EXCLUDED.reversed_rate,
              denied_mean           = EXCLUDED.denied_mean,
              denied_std            = EXCLUDED.denied_std,
              failed_mean           = EXCLUDED.failed_mean,
              failed_std            = EXCLUDED.failed_std,
              reversed_mean         = EXCLUDED.reversed_mean,
              reversed_std          = EXCLUDED.reversed_std,
              raw_payload           = EXCLUDED.raw_payload
            "#,
        )
        .bind(record.bucket_ts)
        .bind(record.state.as_str())
        .bind(s.denied_above_normal)
        .bind(s.failed_above_normal)
        .bind(s.reversed_above_normal)
        .bind(&record.reasons)
        .bind(f64::from(record.severity_score))
        .bind(s.total)
        .bind(s.approved)
        .bind(s.denied)
        .bind(s.failed)
        .bind(s.reversed)
        .bind(s.denied_rate)
        .bind(s.failed_rate)
        .bind(s.reversed_rate)
        .bind(s.denied_mean)
        .bind(s.denied_std)
        .bind(s.failed_mean)
        .bind(s.failed_std)
        .bind(s.reversed_mean)
        .bind(s.reversed_std)
        .bind(raw_payload)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }
}

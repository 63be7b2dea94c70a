//! Transaction event repository
//!
//! Append-only: one row per ingested event, never updated or deleted here.
//! Retrying an insert after an ambiguous failure produces a duplicate row,
//! not corruption.

use casemon_core::{AuthCode, TransactionEvent};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::db::DbError;

/// Transaction event repository
pub struct TransactionRepo<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> TransactionRepo<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }

    /// Append one transaction event.
    pub async fn insert(&mut self, event: &TransactionEvent) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO public.transactions (ts, status, count)
            VALUES ($1, $2, 1)
            "#,
        )
        .bind(event.ts)
        .bind(event.status.as_str())
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Append one auth-code event sharing the transaction's timestamp.
    pub async fn insert_auth_code(
        &mut self,
        ts: DateTime<Utc>,
        code: AuthCode,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO public.transactions_auth_codes (ts, auth_code, count)
            VALUES ($1, $2, 1)
            "#,
        )
        .bind(ts)
        .bind(code.get())
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }
}

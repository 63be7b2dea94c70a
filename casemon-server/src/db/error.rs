//! Database error type shared by the pool, lease guard, and repositories.

use std::time::Duration;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{}", driver_message(.0))]
    Sqlx(#[from] sqlx::Error),

    /// Startup retry window elapsed without a usable pool.
    #[error("DB not reachable after {attempts} attempts: {last_error}")]
    Unreachable {
        attempts: u32,
        #[source]
        last_error: Box<DbError>,
    },

    /// Pool was shut down; acquire fails fast until re-initialized.
    #[error("connection pool is shut down")]
    PoolClosed,

    #[error("timed out after {0:?} connecting to database")]
    ConnectTimeout(Duration),

    /// Lease used after its connection was handed back.
    #[error("connection already released")]
    Released,
}

/// Prefer the server-reported message over sqlx's wrapper text.
fn driver_message(err: &sqlx::Error) -> String {
    match err.as_database_error() {
        Some(db) => db.message().trim().to_owned(),
        None => err.to_string(),
    }
}

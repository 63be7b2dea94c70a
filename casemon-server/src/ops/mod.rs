//! Request-level operations.
//!
//! Each operation validates and authorizes its input before touching the
//! database, then does all of its writes inside a single lease.

pub mod alert;
pub mod ingest;

use casemon_core::ValidationError;

use crate::db::DbError;

pub use alert::{authorize, record_alert};
pub use ingest::ingest;

/// Operation failure
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    /// Deliberately carries no detail about which check failed.
    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Database(#[from] DbError),
}

//! Database layer - connection pool, leases, and repositories
//!
//! # Design Principles
//!
//! - One process-wide pool, bounded by `DB_POOL_MIN..=DB_POOL_MAX`
//! - Every unit of work runs through [`LeaseGuard::with_connection`]
//! - Explicit `BEGIN`/`COMMIT`/`ROLLBACK`; never driver autocommit
//! - Rely on DB constraints, handle conflicts - no check-then-insert

pub mod error;
pub mod lease;
pub mod pool;
pub mod repos;
pub mod retry;

#[cfg(test)]
pub(crate) mod fake;

pub use error::DbError;
pub use lease::{ConnectionSource, LeaseGuard, ManagedConnection};
pub use pool::{PgLease, PoolManager};
pub use repos::EventStore;
pub use retry::{retry_until_deadline, Exhausted};

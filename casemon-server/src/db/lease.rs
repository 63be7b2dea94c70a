//! Scoped connection leases with explicit transaction boundaries.
//!
//! A lease borrows one connection for one unit of work:
//!
//! 1. acquire (lazily initializing the pool if needed)
//! 2. defensive `ROLLBACK` to clear anything a previous holder leaked
//! 3. pre-ping; a stale connection is discarded and replaced by a
//!    standalone connection for this lease only
//! 4. `BEGIN`, run the caller's work, then `COMMIT` on success or
//!    `ROLLBACK` on failure (never both as the primary action)
//! 5. one more defensive `ROLLBACK` if the transaction may still be open,
//!    then release
//!
//! Cleanup rollbacks are best-effort; their failures are logged and dropped
//! because the commit/rollback decision has already been made.

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::error::DbError;
use super::repos::EventStore;

/// Transaction control and liveness probing on a single connection.
#[async_trait]
pub trait ManagedConnection: Send {
    async fn begin(&mut self) -> Result<(), DbError>;
    async fn commit(&mut self) -> Result<(), DbError>;
    async fn rollback(&mut self) -> Result<(), DbError>;
    /// Trivial round-trip (`SELECT 1`).
    async fn ping(&mut self) -> Result<(), DbError>;

    /// Whether a `BEGIN` has not yet been closed by a successful
    /// `COMMIT` or `ROLLBACK`.
    fn in_transaction(&self) -> bool;
}

/// Where leased connections come from and go back to.
#[async_trait]
pub trait ConnectionSource: Send + Sync + 'static {
    type Conn: ManagedConnection + EventStore;

    /// Borrow a pooled connection.
    async fn acquire(&self) -> Result<Self::Conn, DbError>;

    /// Open a fresh connection outside the pool with the same parameters.
    async fn reconnect(&self) -> Result<Self::Conn, DbError>;

    /// Close a connection that must not be reused.
    async fn discard(&self, conn: Self::Conn);

    /// Hand a connection back once its transaction is closed.
    async fn release(&self, conn: Self::Conn);
}

/// Scoped-acquisition entry point for every database operation.
#[derive(Clone)]
pub struct LeaseGuard<S> {
    source: S,
}

impl<S: ConnectionSource> LeaseGuard<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run `work` inside one transaction on one leased connection.
    ///
    /// The connection is returned to its source on every exit path. An error
    /// from `work` rolls the transaction back and is returned unchanged.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count = guard
    ///     .with_connection(|conn| Box::pin(async move { conn.ping().await }))
    ///     .await?;
    /// ```
    pub async fn with_connection<T, F>(&self, work: F) -> Result<T, DbError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut S::Conn) -> BoxFuture<'c, Result<T, DbError>> + Send,
    {
        let mut conn = self.checkout().await?;

        let outcome = run_in_transaction(&mut conn, work).await;

        // A closed transaction needs no second ROLLBACK; the server would
        // only answer with a "no transaction in progress" notice.
        if conn.in_transaction() {
            if let Err(e) = conn.rollback().await {
                tracing::debug!(error = %e, "post-lease rollback failed");
            }
        }
        self.source.release(conn).await;

        outcome
    }

    async fn checkout(&self) -> Result<S::Conn, DbError> {
        let mut conn = self.source.acquire().await?;

        if let Err(e) = conn.rollback().await {
            tracing::debug!(error = %e, "pre-lease rollback failed");
        }

        match conn.ping().await {
            Ok(()) => Ok(conn),
            Err(e) => {
                tracing::warn!(error = %e, "stale connection discarded; opening standalone replacement");
                self.source.discard(conn).await;
                self.source.reconnect().await
            }
        }
    }
}

async fn run_in_transaction<C, T, F>(conn: &mut C, work: F) -> Result<T, DbError>
where
    C: ManagedConnection,
    F: for<'c> FnOnce(&'c mut C) -> BoxFuture<'c, Result<T, DbError>>,
{
    conn.begin().await?;

    match work(&mut *conn).await {
        Ok(value) => match conn.commit().await {
            Ok(()) => Ok(value),
            Err(e) => {
                tracing::error!(error = %e, "commit failed");
                if let Err(rb) = conn.rollback().await {
                    tracing::debug!(error = %rb, "rollback after failed commit also failed");
                }
                Err(e)
            }
        },
        Err(e) => {
            if let Err(rb) = conn.rollback().await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

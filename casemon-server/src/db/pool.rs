//! Database connection pool management
//!
//! Uses sqlx PgPool with explicit connection limits, created with bounded
//! retry so the service survives starting before PostgreSQL. The pool moves
//! through `Uninitialized -> Ready -> Closed`; requests arriving before
//! startup finished initialize it lazily under the same retry policy.

use std::sync::Arc;

use async_trait::async_trait;
use casemon_core::{AlertRecord, AnomalySnapshot, AuthCode, DbConfig, TransactionEvent};
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, Executor, PgConnection, PgPool, Postgres};
use tokio::sync::RwLock;

use super::error::DbError;
use super::lease::{ConnectionSource, ManagedConnection};
use super::repos::{AlertRepo, EventStore, TransactionRepo};
use super::retry::retry_until_deadline;

/// Reported to the server as `application_name`.
const APPLICATION_NAME: &str = "casemon";

enum PoolState {
    Uninitialized,
    Ready(PgPool),
    Closed,
}

struct PoolInner {
    config: DbConfig,
    connect: PgConnectOptions,
    state: RwLock<PoolState>,
}

/// Process-wide handle to the connection pool.
///
/// Cheap to clone; every clone shares one pool.
#[derive(Clone)]
pub struct PoolManager {
    inner: Arc<PoolInner>,
}

impl PoolManager {
    pub fn new(config: DbConfig) -> Self {
        let connect = connect_options(&config);
        Self {
            inner: Arc::new(PoolInner {
                config,
                connect,
                state: RwLock::new(PoolState::Uninitialized),
            }),
        }
    }

    /// Build the pool, retrying until the startup window elapses.
    ///
    /// A no-op when the pool is already up. Called again after
    /// [`shutdown`](Self::shutdown), it re-opens the pool.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unreachable`] carrying the last attempt's error.
    pub async fn initialize(&self) -> Result<(), DbError> {
        let mut state = self.inner.state.write().await;
        if matches!(*state, PoolState::Ready(_)) {
            return Ok(());
        }

        let pool = self.build_with_retry().await?;
        *state = PoolState::Ready(pool);
        Ok(())
    }

    /// Current pool, lazily initializing it on first use.
    ///
    /// Concurrent callers serialize on the state lock, so at most one pool
    /// is ever built.
    pub async fn ensure_ready(&self) -> Result<PgPool, DbError> {
        {
            let state = self.inner.state.read().await;
            match &*state {
                PoolState::Ready(pool) => return Ok(pool.clone()),
                PoolState::Closed => return Err(DbError::PoolClosed),
                PoolState::Uninitialized => {}
            }
        }

        let mut state = self.inner.state.write().await;
        if let PoolState::Ready(pool) = &*state {
            return Ok(pool.clone());
        }
        if matches!(*state, PoolState::Closed) {
            return Err(DbError::PoolClosed);
        }

        tracing::info!("pool not initialized; initializing on first use");
        let pool = self.build_with_retry().await?;
        *state = PoolState::Ready(pool.clone());
        Ok(pool)
    }

    /// Close every pooled connection. Later acquires fail with
    /// [`DbError::PoolClosed`] until [`initialize`](Self::initialize) runs again.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.write().await;
        if let PoolState::Ready(pool) = std::mem::replace(&mut *state, PoolState::Closed) {
            pool.close().await;
            tracing::info!("connection pool closed");
        }
    }

    async fn build_with_retry(&self) -> Result<PgPool, DbError> {
        let policy = self.inner.config.startup_retry;
        retry_until_deadline(policy, "database pool startup", || self.build_pool())
            .await
            .map_err(|e| DbError::Unreachable {
                attempts: e.attempts,
                last_error: Box::new(e.last_error),
            })
    }

    /// One pool attempt: connect, then probe with `SELECT 1`.
    async fn build_pool(&self) -> Result<PgPool, DbError> {
        let config = &self.inner.config;
        let keepalive = &config.keepalive;

        let pool = PgPoolOptions::new()
            .min_connections(config.pool_min)
            .max_connections(config.pool_max)
            .acquire_timeout(config.connect_timeout)
            // sqlx has no TCP keepalive knobs; recycle idle connections
            // before the server-side keepalive would have declared them dead.
            .idle_timeout(keepalive.dead_peer_after())
            // The lease guard pings on checkout itself.
            .test_before_acquire(false)
            .connect_with(self.inner.connect.clone())
            .await?;

        if let Err(e) = sqlx::raw_sql("SELECT 1").execute(&pool).await {
            pool.close().await;
            return Err(e.into());
        }

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            min = config.pool_min,
            max = config.pool_max,
            "connection pool ready"
        );
        Ok(pool)
    }
}

fn connect_options(config: &DbConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.name)
        .username(&config.user)
        .password(&config.password)
        .application_name(APPLICATION_NAME)
        .options([(
            "statement_timeout",
            config.statement_timeout.as_millis().to_string(),
        )])
}

#[async_trait]
impl ConnectionSource for PoolManager {
    type Conn = PgLease;

    async fn acquire(&self) -> Result<PgLease, DbError> {
        let pool = self.ensure_ready().await?;
        let conn = pool.acquire().await?;
        Ok(PgLease::new(LeaseConn::Pooled(conn)))
    }

    async fn reconnect(&self) -> Result<PgLease, DbError> {
        let timeout = self.inner.config.connect_timeout;
        let conn = tokio::time::timeout(timeout, PgConnection::connect_with(&self.inner.connect))
            .await
            .map_err(|_| DbError::ConnectTimeout(timeout))??;
        Ok(PgLease::new(LeaseConn::Standalone(conn)))
    }

    async fn discard(&self, mut lease: PgLease) {
        let result = match lease.conn.take() {
            Some(LeaseConn::Pooled(conn)) => conn.close().await,
            Some(LeaseConn::Standalone(conn)) => conn.close().await,
            None => Ok(()),
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "error closing discarded connection");
        }
    }

    async fn release(&self, mut lease: PgLease) {
        if lease.in_transaction {
            tracing::warn!("transaction still open at release; closing connection");
            return self.discard(lease).await;
        }
        match lease.conn.take() {
            // Dropping a pooled connection returns it to the pool.
            Some(LeaseConn::Pooled(conn)) => drop(conn),
            Some(LeaseConn::Standalone(conn)) => {
                if let Err(e) = conn.close().await {
                    tracing::debug!(error = %e, "error closing standalone connection");
                }
            }
            None => {}
        }
    }
}

enum LeaseConn {
    Pooled(PoolConnection<Postgres>),
    Standalone(PgConnection),
}

/// A connection on loan to one [`LeaseGuard`](super::LeaseGuard) call.
///
/// Dropped while a transaction is open (a cancelled request, say), a pooled
/// connection is detached and closed rather than returned to the pool.
pub struct PgLease {
    conn: Option<LeaseConn>,
    in_transaction: bool,
}

impl PgLease {
    fn new(conn: LeaseConn) -> Self {
        Self {
            conn: Some(conn),
            in_transaction: false,
        }
    }

    fn conn(&mut self) -> Result<&mut PgConnection, DbError> {
        match self.conn.as_mut() {
            Some(LeaseConn::Pooled(conn)) => Ok(&mut **conn),
            Some(LeaseConn::Standalone(conn)) => Ok(conn),
            None => Err(DbError::Released),
        }
    }

    /// Argument-free statement over the simple query protocol.
    async fn execute(&mut self, sql: &'static str) -> Result<(), DbError> {
        let conn = self.conn()?;
        Executor::execute(conn, sql).await?;
        Ok(())
    }
}

impl Drop for PgLease {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        if let Some(LeaseConn::Pooled(conn)) = self.conn.take() {
            tracing::warn!("lease dropped mid-transaction; detaching connection from pool");
            drop(conn.detach());
        }
    }
}

#[async_trait]
impl ManagedConnection for PgLease {
    async fn begin(&mut self) -> Result<(), DbError> {
        self.execute("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.execute("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.execute("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), DbError> {
        self.execute("SELECT 1").await
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[async_trait]
impl EventStore for PgLease {
    async fn insert_transaction(&mut self, event: &TransactionEvent) -> Result<(), DbError> {
        TransactionRepo::new(self.conn()?).insert(event).await
    }

    async fn insert_auth_code(&mut self, ts: DateTime<Utc>, code: AuthCode) -> Result<(), DbError> {
        TransactionRepo::new(self.conn()?)
            .insert_auth_code(ts, code)
            .await
    }

    async fn anomaly_snapshot(&mut self, bucket_ts: DateTime<Utc>) -> Result<AnomalySnapshot, DbError> {
        AlertRepo::new(self.conn()?).snapshot(bucket_ts).await
    }

    async fn upsert_alert(&mut self, record: &AlertRecord) -> Result<(), DbError> {
        AlertRepo::new(self.conn()?).upsert(record).await
    }
}

//! In-memory connection source for exercising the lease guard, operations,
//! and routes without a live PostgreSQL.
//!
//! Writes are staged per connection and only become visible on `COMMIT`,
//! so rollback behavior can be asserted directly.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use casemon_core::{AlertRecord, AlertState, AnomalySnapshot, AuthCode, TransactionEvent};
use chrono::{DateTime, Utc};

use super::error::DbError;
use super::lease::{ConnectionSource, ManagedConnection};
use super::repos::EventStore;

/// Every interaction the fake observed, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Acquire,
    Reconnect,
    Discard,
    Release,
    Begin,
    Commit,
    Rollback,
    Ping,
    InsertTransaction,
    InsertAuthCode,
    FetchSnapshot,
    UpsertAlert,
}

#[derive(Debug, Clone)]
enum Write {
    Transaction(TransactionEvent),
    AuthCode(DateTime<Utc>, AuthCode),
    Alert(AlertRecord),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    open_leases: usize,

    closed: bool,
    unreachable: bool,
    fail_next_ping: bool,
    fail_next_commit: bool,
    fail_rollbacks: bool,
    fail_next_write: bool,
    fail_write_of: Option<Call>,

    transactions: Vec<TransactionEvent>,
    auth_codes: Vec<(DateTime<Utc>, AuthCode)>,
    alerts: HashMap<(DateTime<Utc>, AlertState), AlertRecord>,
    snapshots: HashMap<DateTime<Utc>, AnomalySnapshot>,
}

impl FakeState {
    fn apply(&mut self, write: Write) {
        match write {
            Write::Transaction(event) => self.transactions.push(event),
            Write::AuthCode(ts, code) => self.auth_codes.push((ts, code)),
            Write::Alert(record) => {
                self.alerts.insert((record.bucket_ts, record.state), record);
            }
        }
    }
}

/// Shared handle to the fake database.
#[derive(Clone, Default)]
pub struct FakeDb {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection source backed by this database.
    pub fn source(&self) -> FakeDb {
        self.clone()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn open_leases(&self) -> usize {
        self.state().open_leases
    }

    /// Make every subsequent acquire fail with `PoolClosed`.
    pub fn close(&self) {
        self.state().closed = true;
    }

    /// Control whether standalone reconnects succeed.
    pub fn set_reachable(&self, reachable: bool) {
        self.state().unreachable = !reachable;
    }

    pub fn fail_next_ping(&self) {
        self.state().fail_next_ping = true;
    }

    pub fn fail_next_commit(&self) {
        self.state().fail_next_commit = true;
    }

    pub fn fail_rollbacks(&self, fail: bool) {
        self.state().fail_rollbacks = fail;
    }

    /// Fail the next insert or upsert with a constraint violation.
    pub fn fail_next_write(&self) {
        self.state().fail_next_write = true;
    }

    /// Fail the next write of one particular kind.
    pub fn fail_next_write_of(&self, call: Call) {
        self.state().fail_write_of = Some(call);
    }

    pub fn set_snapshot(&self, bucket_ts: DateTime<Utc>, snapshot: AnomalySnapshot) {
        self.state().snapshots.insert(bucket_ts, snapshot);
    }

    pub fn transactions(&self) -> Vec<TransactionEvent> {
        self.state().transactions.clone()
    }

    pub fn auth_codes(&self) -> Vec<(DateTime<Utc>, AuthCode)> {
        self.state().auth_codes.clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.state().alerts.values().cloned().collect()
    }

    fn connect(&self) -> FakeConn {
        self.state().open_leases += 1;
        FakeConn {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
            in_transaction: false,
        }
    }
}

#[async_trait]
impl ConnectionSource for FakeDb {
    type Conn = FakeConn;

    async fn acquire(&self) -> Result<FakeConn, DbError> {
        {
            let mut state = self.state();
            state.calls.push(Call::Acquire);
            if state.closed {
                return Err(DbError::PoolClosed);
            }
        }
        Ok(self.connect())
    }

    async fn reconnect(&self) -> Result<FakeConn, DbError> {
        {
            let mut state = self.state();
            state.calls.push(Call::Reconnect);
            if state.unreachable {
                return Err(DbError::Sqlx(sqlx::Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))));
            }
        }
        Ok(self.connect())
    }

    async fn discard(&self, _conn: FakeConn) {
        let mut state = self.state();
        state.calls.push(Call::Discard);
        state.open_leases -= 1;
    }

    async fn release(&self, _conn: FakeConn) {
        let mut state = self.state();
        state.calls.push(Call::Release);
        state.open_leases -= 1;
    }
}

/// One leased fake connection.
pub struct FakeConn {
    state: Arc<Mutex<FakeState>>,
    staged: Vec<Write>,
    in_transaction: bool,
}

impl FakeConn {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn write(&mut self, call: Call, write: Write) -> Result<(), DbError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        let targeted = state.fail_write_of == Some(call);
        if targeted {
            state.fail_write_of = None;
        }
        if std::mem::take(&mut state.fail_next_write) || targeted {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(
                "violates check constraint".into(),
            )));
        }
        if self.in_transaction {
            self.staged.push(write);
        } else {
            state.apply(write);
        }
        Ok(())
    }
}

#[async_trait]
impl ManagedConnection for FakeConn {
    async fn begin(&mut self) -> Result<(), DbError> {
        self.state().calls.push(Call::Begin);
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Commit);
        if std::mem::take(&mut state.fail_next_commit) {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(
                "commit failed: connection reset".into(),
            )));
        }
        for write in self.staged.drain(..) {
            state.apply(write);
        }
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        let fail = {
            let mut state = self.state();
            state.calls.push(Call::Rollback);
            state.fail_rollbacks
        };
        if fail {
            return Err(DbError::Sqlx(sqlx::Error::Protocol("rollback failed".into())));
        }
        self.staged.clear();
        self.in_transaction = false;
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), DbError> {
        let mut state = self.state();
        state.calls.push(Call::Ping);
        if std::mem::take(&mut state.fail_next_ping) {
            return Err(DbError::Sqlx(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "server closed the connection unexpectedly",
            ))));
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[async_trait]
impl EventStore for FakeConn {
    async fn insert_transaction(&mut self, event: &TransactionEvent) -> Result<(), DbError> {
        self.write(Call::InsertTransaction, Write::Transaction(event.clone()))
    }

    async fn insert_auth_code(&mut self, ts: DateTime<Utc>, code: AuthCode) -> Result<(), DbError> {
        self.write(Call::InsertAuthCode, Write::AuthCode(ts, code))
    }

    async fn anomaly_snapshot(&mut self, bucket_ts: DateTime<Utc>) -> Result<AnomalySnapshot, DbError> {
        let mut state = self.state();
        state.calls.push(Call::FetchSnapshot);
        Ok(state.snapshots.get(&bucket_ts).cloned().unwrap_or_default())
    }

    async fn upsert_alert(&mut self, record: &AlertRecord) -> Result<(), DbError> {
        self.write(Call::UpsertAlert, Write::Alert(record.clone()))
    }
}

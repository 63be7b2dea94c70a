//! Transaction events as accepted by the ingestion endpoint.
//!
//! All user input is validated when building these types; an invalid event
//! never reaches the database layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::timestamp::parse_timestamp;

/// Outcome reported for a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Approved,
    Denied,
    Failed,
    Reversed,
    BackendReversed,
}

impl TxStatus {
    pub const ALL: [TxStatus; 5] = [
        TxStatus::Approved,
        TxStatus::Denied,
        TxStatus::Failed,
        TxStatus::Reversed,
        TxStatus::BackendReversed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Failed => "failed",
            Self::Reversed => "reversed",
            Self::BackendReversed => "backend_reversed",
        }
    }
}

/// Exact, case-sensitive match against the stored spelling.
impl FromStr for TxStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_status(s))
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Card authorization code, 0..=9999.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthCode(i32);

impl AuthCode {
    pub const MAX: i64 = 9999;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (0..=Self::MAX).contains(&value) {
            Ok(Self(value as i32))
        } else {
            Err(ValidationError::AuthCodeOutOfRange { value })
        }
    }

    pub fn get(&self) -> i32 {
        self.0
    }
}

/// A validated transaction event, ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEvent {
    pub ts: DateTime<Utc>,
    pub status: TxStatus,
    pub auth_code: Option<AuthCode>,
}

impl TransactionEvent {
    /// Validate raw request fields.
    ///
    /// Checks run in the order timestamp, status, auth code; the first
    /// failure is returned.
    ///
    /// # Example
    /// ```
    /// use casemon_core::transaction::{TransactionEvent, TxStatus};
    ///
    /// let ev = TransactionEvent::parse("2024-01-01T00:00:30Z", "approved", Some(1234)).unwrap();
    /// assert_eq!(ev.status, TxStatus::Approved);
    /// assert!(TransactionEvent::parse("2024-01-01T00:00:30Z", "pending", None).is_err());
    /// ```
    pub fn parse(ts: &str, status: &str, auth_code: Option<i64>) -> Result<Self, ValidationError> {
        let ts = parse_timestamp(ts)?;
        let status = status.parse()?;
        let auth_code = auth_code.map(AuthCode::new).transpose()?;

        Ok(Self {
            ts,
            status,
            auth_code,
        })
    }
}

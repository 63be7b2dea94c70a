//! casemon-core: domain types for transaction and alert monitoring
//!
//! Pure logic with no database or network access: timestamp normalization,
//! input validation, alert state derivation, and environment configuration.

pub mod alert;
pub mod config;
pub mod error;
pub mod timestamp;
pub mod transaction;

pub use alert::{event_timestamp, AlertRecord, AlertState, AnomalySnapshot};
pub use config::{AppConfig, DbConfig, KeepaliveConfig, RetryPolicy};
pub use error::{ConfigError, ValidationError};
pub use timestamp::{floor_to_minute, format_timestamp, parse_timestamp};
pub use transaction::{AuthCode, TransactionEvent, TxStatus};

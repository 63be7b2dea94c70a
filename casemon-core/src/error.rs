/// Structured error types for casemon-core.
///
/// Uses `thiserror` so the server crate can map each variant onto an HTTP
/// status without string matching. The binary (casemon-cli) wraps these in
/// `anyhow` for reporting.

use thiserror::Error;

/// Input rejected before any database work happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Timestamp could not be parsed as ISO-8601
    #[error("Invalid ISO-8601 timestamp '{value}'")]
    InvalidTimestamp { value: String },

    /// Transaction status outside the allowed set
    #[error("Invalid status: {value}")]
    InvalidStatus { value: String },

    /// Auth code outside [0, 9999]
    #[error("auth_code must be between 0 and 9999 (got {value})")]
    AuthCodeOutOfRange { value: i64 },

    /// Request body is not the JSON document expected
    #[error("Invalid JSON payload: {reason}")]
    InvalidPayload { reason: String },
}

impl ValidationError {
    /// Create an invalid timestamp error
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
        }
    }

    /// Create an invalid status error
    pub fn invalid_status(value: impl Into<String>) -> Self {
        Self::InvalidStatus {
            value: value.into(),
        }
    }

    /// Create an invalid payload error
    pub fn invalid_payload(reason: impl ToString) -> Self {
        Self::InvalidPayload {
            reason: reason.to_string(),
        }
    }
}

/// Environment configuration could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable present but unparsable
    #[error("Invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// Values parse individually but contradict each other
    #[error("Inconsistent configuration: {reason}")]
    Inconsistent { reason: String },
}

impl ConfigError {
    pub fn invalid(var: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn inconsistent(reason: impl Into<String>) -> Self {
        Self::Inconsistent {
            reason: reason.into(),
        }
    }
}

//! Alert state derived from Grafana webhook payloads.
//!
//! The webhook body is consumed as opaque JSON; only `status` and
//! `alerts[0].startsAt` are interpreted. Everything else is stored verbatim.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::timestamp::{floor_to_minute, parse_timestamp};

/// Lifecycle state of an alert notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Firing,
    Resolved,
}

impl AlertState {
    /// Read `status` from a webhook payload.
    ///
    /// Case-insensitive; anything other than `resolved` (including a missing
    /// field) is treated as `firing`.
    pub fn from_payload(payload: &Value) -> Self {
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if status.trim().eq_ignore_ascii_case("resolved") {
            Self::Resolved
        } else {
            Self::Firing
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start time of the first alert in the payload, if present and parsable.
///
/// Accepts both `startsAt` and `starts_at`.
pub fn alert_start(payload: &Value) -> Option<DateTime<Utc>> {
    let first = payload.get("alerts")?.as_array()?.first()?;

    let starts_at = ["startsAt", "starts_at"]
        .iter()
        .filter_map(|key| first.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())?;

    parse_timestamp(starts_at).ok()
}

/// Event time for a payload, falling back to `now` when the alert carries no
/// usable start time.
pub fn event_timestamp(payload: &Value, now: DateTime<Utc>) -> DateTime<Utc> {
    alert_start(payload).unwrap_or(now)
}

/// Per-minute aggregates read from the `v_tx_anomaly` view.
///
/// `Default` is the all-zero snapshot used when the bucket has no row yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalySnapshot {
    pub denied_above_normal: bool,
    pub failed_above_normal: bool,
    pub reversed_above_normal: bool,

    pub total: i64,
    pub approved: i64,
    pub denied: i64,
    pub failed: i64,
    pub reversed: i64,

    pub denied_rate: f64,
    pub failed_rate: f64,
    pub reversed_rate: f64,

    pub denied_mean: Option<f64>,
    pub denied_std: Option<f64>,
    pub failed_mean: Option<f64>,
    pub failed_std: Option<f64>,
    pub reversed_mean: Option<f64>,
    pub reversed_std: Option<f64>,
}

impl AnomalySnapshot {
    /// Names of the above-normal flags that are set, always in the order
    /// denied, failed, reversed.
    pub fn reasons(&self) -> Vec<String> {
        [
            ("denied_above_normal", self.denied_above_normal),
            ("failed_above_normal", self.failed_above_normal),
            ("reversed_above_normal", self.reversed_above_normal),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| name.to_owned())
        .collect()
    }

    /// Number of flags set (0..=3).
    pub fn severity_score(&self) -> u8 {
        [
            self.denied_above_normal,
            self.failed_above_normal,
            self.reversed_above_normal,
        ]
        .into_iter()
        .filter(|set| *set)
        .count() as u8
    }
}

/// Everything written to `transaction_alerts` for one delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub event_ts: DateTime<Utc>,
    pub bucket_ts: DateTime<Utc>,
    pub state: AlertState,
    pub reasons: Vec<String>,
    pub severity_score: u8,
    pub snapshot: AnomalySnapshot,
    pub raw_payload: Value,
}

impl AlertRecord {
    pub fn new(
        event_ts: DateTime<Utc>,
        state: AlertState,
        snapshot: AnomalySnapshot,
        raw_payload: Value,
    ) -> Self {
        Self {
            event_ts,
            bucket_ts: floor_to_minute(event_ts),
            state,
            reasons: snapshot.reasons(),
            severity_score: snapshot.severity_score(),
            snapshot,
            raw_payload,
        }
    }
}

//! Liveness evaluation for print agents.
//!
//! Connection status is never stored. It is derived from the last heartbeat
//! timestamp and the current time, so a record that stops being refreshed
//! turns disconnected on its own once it is older than [`HEARTBEAT_TIMEOUT`].
//! Callers must re-evaluate on a timer, not only when new data arrives.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::heartbeat::HeartbeatRecord;

/// Age beyond which a heartbeat no longer implies a live agent.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection status of an agent as seen at a given instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub platform: Option<String>,
    pub is_printing: bool,
    pub pending_orders: u32,
    pub printers_count: u32,
    /// Whole seconds since the last heartbeat.
    pub time_since_last_heartbeat: Option<i64>,
}

impl ConnectionStatus {
    /// Status reported when no heartbeat was ever received.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Re-derive the time-dependent fields from `last_seen`.
    ///
    /// Used between polls: the capability snapshot stays as fetched while the
    /// connected flag follows the clock.
    pub fn retick(&mut self, now: DateTime<Utc>) {
        if let Some(last_seen) = self.last_seen {
            let (connected, seconds) = elapsed(last_seen, now);
            self.is_connected = connected;
            self.time_since_last_heartbeat = Some(seconds);
        }
    }
}

/// Status of a single agent, keyed by its client id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub client_id: String,
    pub status: ConnectionStatus,
}

/// Compute the connection status from the most recent heartbeat.
pub fn evaluate(latest: Option<&HeartbeatRecord>, now: DateTime<Utc>) -> ConnectionStatus {
    let Some(record) = latest else {
        return ConnectionStatus::disconnected();
    };

    let (is_connected, seconds) = elapsed(record.last_heartbeat_at, now);

    ConnectionStatus {
        is_connected,
        last_seen: Some(record.last_heartbeat_at),
        client_name: record.client_name.clone(),
        client_version: record.client_version.clone(),
        platform: record.platform.clone(),
        is_printing: record.is_printing.unwrap_or(false),
        pending_orders: record.pending_orders.unwrap_or(0),
        printers_count: record.printers_count.unwrap_or(0),
        time_since_last_heartbeat: Some(seconds),
    }
}

/// Evaluate every agent independently.
pub fn evaluate_all(records: &[HeartbeatRecord], now: DateTime<Utc>) -> Vec<AgentStatus> {
    records
        .iter()
        .map(|record| AgentStatus {
            client_id: record.client_id.clone(),
            status: evaluate(Some(record), now),
        })
        .collect()
}

/// Strict comparison: an age of exactly the timeout is disconnected.
fn elapsed(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> (bool, i64) {
    let elapsed_ms = (now - last_seen).num_milliseconds();
    let timeout_ms = HEARTBEAT_TIMEOUT.as_millis() as i64;
    (elapsed_ms < timeout_ms, elapsed_ms.max(0) / 1000)
}

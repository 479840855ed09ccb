//! Heartbeat payloads and stored records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Heartbeat sent by an agent to the ingestion endpoint.
///
/// Only `restaurant_id` and `client_id` are required. They default to empty
/// strings so that a missing field is reported by [`HeartbeatPayload::validate`]
/// instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub restaurant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printers_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_printing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_orders: Option<u32>,
}

impl HeartbeatPayload {
    /// Create a payload carrying only the identity of an agent.
    pub fn new(restaurant_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    /// Check that both identity fields are present.
    pub fn validate(&self) -> Result<()> {
        if self.restaurant_id.trim().is_empty() {
            return Err(CoreError::MissingField("restaurant_id"));
        }
        if self.client_id.trim().is_empty() {
            return Err(CoreError::MissingField("client_id"));
        }
        Ok(())
    }
}

/// Last known liveness and capability snapshot of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub restaurant_id: String,
    pub client_id: String,
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub platform: Option<String>,
    pub printers_count: Option<u32>,
    pub is_printing: Option<bool>,
    pub pending_orders: Option<u32>,
    pub last_heartbeat_at: DateTime<Utc>,
}

impl HeartbeatRecord {
    /// Create a record with no capability fields.
    pub fn new(
        restaurant_id: impl Into<String>,
        client_id: impl Into<String>,
        last_heartbeat_at: DateTime<Utc>,
    ) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            client_id: client_id.into(),
            client_name: None,
            client_version: None,
            platform: None,
            printers_count: None,
            is_printing: None,
            pending_orders: None,
            last_heartbeat_at,
        }
    }
}

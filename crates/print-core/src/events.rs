//! Events delivered on the per-restaurant change feed.

use serde::{Deserialize, Serialize};

use crate::heartbeat::HeartbeatRecord;

/// Kind of row mutation behind an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// An event pushed to dashboards subscribed to a restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// A heartbeat row changed.
    HeartbeatChanged {
        op: ChangeOp,
        heartbeat: HeartbeatRecord,
    },
    /// An order's print status moved into `printed`.
    OrderPrinted {
        restaurant_id: String,
        order_id: String,
        order_number: Option<i64>,
        order_type: Option<String>,
    },
}

impl RelayEvent {
    pub fn restaurant_id(&self) -> &str {
        match self {
            Self::HeartbeatChanged { heartbeat, .. } => &heartbeat.restaurant_id,
            Self::OrderPrinted { restaurant_id, .. } => restaurant_id,
        }
    }

    /// Event name used on the SSE wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HeartbeatChanged { .. } => "heartbeat",
            Self::OrderPrinted { .. } => "order_printed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = RelayEvent::OrderPrinted {
            restaurant_id: "r1".to_string(),
            order_id: "o1".to_string(),
            order_number: Some(7),
            order_type: Some("table".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order_printed");
        assert_eq!(event.restaurant_id(), "r1");
        assert_eq!(event.name(), "order_printed");
    }
}

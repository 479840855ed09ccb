//! Core types and rules for the print dispatch bridge.
//!
//! This crate is shared by the cloud service, the dashboard client and the
//! local print agent. It has no I/O and defines:
//!
//! - [`evaluate`] / [`ConnectionStatus`] - Liveness derived from heartbeats
//! - [`PrintSettings`] / [`OrderType`] - Auto-print policy per order type
//! - [`is_printed_transition`] - The "order was printed" notification filter
//! - [`RelayEvent`] - Events carried on the per-restaurant change feed
//! - Wire payloads exchanged over HTTP between agent, service and dashboard
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use print_core::{evaluate, HeartbeatRecord};
//!
//! let now = Utc::now();
//! let record = HeartbeatRecord::new("rest-1", "agent-1", now - Duration::seconds(10));
//!
//! let status = evaluate(Some(&record), now);
//! assert!(status.is_connected);
//! assert_eq!(status.time_since_last_heartbeat, Some(10));
//! ```

mod config;
mod error;
mod events;
mod heartbeat;
mod liveness;
mod order;
mod print_log;
mod settings;

pub use config::{
    AvailablePrinter, CategoryInfo, PrintConfig, PrinterConfig, PrinterSyncRequest, PrinterSyncResult,
    ReceiptSettings, RestaurantInfo, SystemPrinter, SYNCED_PRINTER_PAPER_WIDTH,
};
pub use error::{CoreError, Result};
pub use events::{ChangeOp, RelayEvent};
pub use heartbeat::{HeartbeatPayload, HeartbeatRecord};
pub use liveness::{evaluate, evaluate_all, AgentStatus, ConnectionStatus, HEARTBEAT_TIMEOUT};
pub use order::{is_printed_transition, OrderPrintStatus, PrintOrder, PrintOrderItem};
pub use print_log::{NewPrintLog, PrintEventType, PrintLogEntry, PrintOutcome};
pub use settings::{OrderType, PrintSettings, PrintSettingsPatch};

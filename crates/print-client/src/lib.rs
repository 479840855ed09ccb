//! Client library for the print dispatch service.
//!
//! This crate provides a Rust client for the print service over HTTP. It
//! supports:
//!
//! - Agent calls: heartbeats, print config, print queue, print logs
//! - Dashboard calls: agent status, print settings, print intents
//! - The per-restaurant change feed via Server-Sent Events (SSE)
//! - A liveness monitor that keeps the connection status current
//!
//! # Example
//!
//! ```no_run
//! use print_client::{ClientConfig, CloudClient, HeartbeatMonitor, MonitorConfig};
//!
//! # async fn example() -> Result<(), print_client::ClientError> {
//! let client = CloudClient::new(ClientConfig::new("http://localhost:8790"))?;
//!
//! let monitor = HeartbeatMonitor::start(client.clone(), "rest-1", MonitorConfig::default());
//! let mut status = monitor.subscribe();
//! while status.changed().await.is_ok() {
//!     println!("connected: {}", status.borrow().is_connected);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod monitor;
pub mod recorder;
pub mod settings;
pub mod sse;

pub use client::{CloudClient, HeartbeatAck, HeartbeatList};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use monitor::{HeartbeatMonitor, MonitorConfig};
pub use recorder::PrintLogRecorder;
pub use settings::SettingsResolver;
pub use sse::{EventFeed, ReconnectConfig};

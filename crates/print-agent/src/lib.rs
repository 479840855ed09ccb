//! Print agent for restaurant receipt printers.
//!
//! The agent runs on a machine next to the printers. It reports liveness
//! to the print service, polls the restaurant's print queue, renders each
//! order as an ESC/POS receipt and sends it to the matching printer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use print_agent::{Agent, AgentConfig, SystemDriver};
//! use tokio::sync::oneshot;
//!
//! # async fn example() {
//! let config = AgentConfig {
//!     restaurant_id: "r1".to_string(),
//!     printer_name: "Kitchen".to_string(),
//!     ..Default::default()
//! };
//! let agent = Agent::new(config, Arc::new(SystemDriver::default()), None);
//!
//! let (_stop, shutdown) = oneshot::channel();
//! agent.run(shutdown).await;
//! # }
//! ```

pub mod agent;
pub mod bridge;
pub mod config;
pub mod driver;
pub mod error;
pub mod escpos;
pub mod receipt;

pub use agent::{select_printer, Agent, AgentEvent, AgentStats, SelectedPrinter};
pub use bridge::{ActionResult, Bridge, BridgeRequest, ConfigUpdate};
pub use config::{config_path_from_env, AgentConfig, LocalPrinters};
pub use driver::{MockDriver, PrintJob, PrintTarget, PrinterDriver, SystemDriver};
pub use error::{AgentError, DeviceError, Result};
pub use receipt::{PaperCut, PrintLayout, Receipt};

//! Agent configuration, persisted as a JSON file.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use print_core::OrderType;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AgentError, Result};
use crate::receipt::PrintLayout;

/// Default location of the config file.
pub const DEFAULT_CONFIG_PATH: &str = "print-agent.json";

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8790";

pub const DEFAULT_CLIENT_NAME: &str = "Print Agent";

/// Spooler queues chosen locally per order type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalPrinters {
    pub counter: String,
    pub table: String,
    pub delivery: String,
    pub default: String,
}

impl LocalPrinters {
    /// Printer set for an order type, if any.
    pub fn for_order_type(&self, order_type: &OrderType) -> Option<&str> {
        let name = match order_type {
            OrderType::Counter => &self.counter,
            OrderType::Table => &self.table,
            OrderType::Delivery => &self.delivery,
            OrderType::Other(_) => return None,
        };
        Some(name.as_str()).filter(|n| !n.is_empty())
    }
}

/// Persisted agent settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the print service.
    pub server_url: String,
    pub restaurant_id: String,
    /// Identity of this agent in heartbeats. Generated on first start.
    pub client_id: String,
    pub client_name: String,
    /// Fallback printer when no per-type printer is set.
    pub printer_name: String,
    pub printers: LocalPrinters,
    /// Printers the operator enabled on this machine.
    pub selected_printers: Vec<String>,
    pub check_interval_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub layout: PrintLayout,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            restaurant_id: String::new(),
            client_id: String::new(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            printer_name: String::new(),
            printers: LocalPrinters::default(),
            selected_printers: Vec::new(),
            check_interval_secs: 5,
            heartbeat_interval_secs: 10,
            layout: PrintLayout::default(),
        }
    }
}

impl AgentConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No agent config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(AgentError::ConfigIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&contents).map_err(|source| AgentError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write to `path` through a temporary file so a crash never leaves a
    /// truncated config behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| AgentError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        let io_err = |source| AgentError::ConfigIo {
            path: path.to_path_buf(),
            source,
        };
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;

        debug!(path = %path.display(), "Agent config saved");
        Ok(())
    }

    /// Apply environment overrides.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `PRINT_SERVER_URL` | Base URL of the print service |
    /// | `PRINT_RESTAURANT_ID` | Restaurant served by this agent |
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("PRINT_SERVER_URL") {
            if !url.trim().is_empty() {
                self.server_url = url.trim().to_string();
            }
        }
        if let Ok(id) = env::var("PRINT_RESTAURANT_ID") {
            if !id.trim().is_empty() {
                self.restaurant_id = id.trim().to_string();
            }
        }
    }

    /// Assign a client id if none is set. Returns whether one was generated.
    pub fn ensure_client_id(&mut self) -> bool {
        if !self.client_id.trim().is_empty() {
            return false;
        }
        self.client_id = uuid::Uuid::new_v4().simple().to_string();
        true
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Whether the agent knows which service and restaurant to serve.
    pub fn is_configured(&self) -> bool {
        !self.restaurant_id.trim().is_empty() && !self.server_url.trim().is_empty()
    }
}

/// Path of the config file, from `PRINT_AGENT_CONFIG` or the default.
pub fn config_path_from_env() -> PathBuf {
    env::var("PRINT_AGENT_CONFIG")
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

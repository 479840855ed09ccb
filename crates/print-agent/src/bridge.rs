//! Local control surface for the agent.
//!
//! A desktop shell or an operator talks to the agent with one JSON object
//! per line. Requests carry an `op` and an optional `id` echoed in the
//! reply:
//!
//! ```text
//! -> {"id": 1, "op": "get_stats"}
//! <- {"id": 1, "result": {"printed_count": 0, ...}}
//! ```
//!
//! Agent events are written on the same stream as
//! `{"event": "...", "data": ...}` lines.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentEvent, AgentStats};
use crate::config::{AgentConfig, LocalPrinters};
use crate::driver::{PrinterDescriptor, UsbPrinterDescriptor};
use crate::error::Result;
use crate::receipt::PrintLayout;

/// Partial configuration change. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub server_url: Option<String>,
    pub restaurant_id: Option<String>,
    pub client_name: Option<String>,
    pub printer_name: Option<String>,
    pub printers: Option<LocalPrinters>,
    pub selected_printers: Option<Vec<String>>,
    pub check_interval_secs: Option<u64>,
    pub heartbeat_interval_secs: Option<u64>,
    pub paper_width: Option<usize>,
}

impl ConfigUpdate {
    pub fn apply(self, config: &mut AgentConfig) {
        if let Some(server_url) = self.server_url {
            config.server_url = server_url.trim().trim_end_matches('/').to_string();
        }
        if let Some(restaurant_id) = self.restaurant_id {
            config.restaurant_id = restaurant_id.trim().to_string();
        }
        if let Some(client_name) = self.client_name {
            config.client_name = client_name;
        }
        if let Some(printer_name) = self.printer_name {
            config.printer_name = printer_name;
        }
        if let Some(printers) = self.printers {
            config.printers = printers;
        }
        if let Some(selected) = self.selected_printers {
            config.selected_printers = selected;
        }
        if let Some(secs) = self.check_interval_secs.filter(|s| *s > 0) {
            config.check_interval_secs = secs;
        }
        if let Some(secs) = self.heartbeat_interval_secs.filter(|s| *s > 0) {
            config.heartbeat_interval_secs = secs;
        }
        if let Some(width) = self.paper_width {
            config.layout.paper_width = width;
        }
    }
}

/// Outcome of an action on the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

impl<T> From<Result<T>> for ActionResult {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(e) => Self::failed(e),
        }
    }
}

/// A request on the bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeRequest {
    GetConfig,
    SaveConfig { config: ConfigUpdate },
    SaveLayout { layout: PrintLayout },
    TestPrintLayout { layout: PrintLayout },
    GetSystemPrinters,
    GetUsbPrinters,
    TestUsbConnection { vendor_id: u16, product_id: u16 },
    TestPrint,
    GetStats,
    Reconnect,
    SyncPrinters,
}

/// Operations offered to the local control surface.
#[derive(Clone)]
pub struct Bridge {
    agent: Agent,
}

impl Bridge {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.agent.subscribe()
    }

    pub fn get_config(&self) -> AgentConfig {
        self.agent.config()
    }

    /// Persist a configuration change and reconnect when the agent is
    /// configured.
    pub async fn save_config(&self, update: ConfigUpdate) -> ActionResult {
        let config = match self.agent.update_config(|config| update.apply(config)) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to save config");
                return ActionResult::failed(e);
            }
        };
        info!(restaurant_id = %config.restaurant_id, "Config saved");

        if config.is_configured() {
            self.agent.connect().await;
        }
        ActionResult::ok()
    }

    pub fn save_layout(&self, layout: PrintLayout) -> ActionResult {
        self.agent
            .update_config(|config| config.layout = layout)
            .into()
    }

    /// Print a test page with an unsaved layout.
    pub async fn test_print_layout(&self, layout: PrintLayout) -> ActionResult {
        self.agent.test_print(Some(layout)).await.into()
    }

    pub async fn test_print(&self) -> ActionResult {
        self.agent.test_print(None).await.into()
    }

    /// Spooler printers. Enumeration failures yield an empty list.
    pub async fn get_system_printers(&self) -> Vec<PrinterDescriptor> {
        self.agent
            .driver()
            .list_system_printers()
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to list system printers");
                Vec::new()
            })
    }

    /// USB printers. Enumeration failures yield an empty list.
    pub async fn get_usb_printers(&self) -> Vec<UsbPrinterDescriptor> {
        self.agent
            .driver()
            .list_usb_printers()
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to list USB printers");
                Vec::new()
            })
    }

    pub async fn test_usb_connection(&self, vendor_id: u16, product_id: u16) -> ActionResult {
        match self.agent.driver().test_connection(vendor_id, product_id).await {
            Ok(()) => ActionResult::ok(),
            Err(e) => ActionResult::failed(e),
        }
    }

    pub fn get_stats(&self) -> AgentStats {
        self.agent.stats()
    }

    pub async fn reconnect(&self) -> bool {
        self.agent.connect().await
    }

    /// Send the spooler printers to the service now.
    pub async fn sync_printers(&self) -> ActionResult {
        self.agent.sync_printers().await.into()
    }

    /// Run one request and return its JSON result.
    pub async fn handle(&self, request: BridgeRequest) -> Value {
        debug!(request = ?request, "Bridge request");
        let result = match request {
            BridgeRequest::GetConfig => serde_json::to_value(self.get_config()),
            BridgeRequest::SaveConfig { config } => serde_json::to_value(self.save_config(config).await),
            BridgeRequest::SaveLayout { layout } => serde_json::to_value(self.save_layout(layout)),
            BridgeRequest::TestPrintLayout { layout } => {
                serde_json::to_value(self.test_print_layout(layout).await)
            }
            BridgeRequest::GetSystemPrinters => serde_json::to_value(self.get_system_printers().await),
            BridgeRequest::GetUsbPrinters => serde_json::to_value(self.get_usb_printers().await),
            BridgeRequest::TestUsbConnection {
                vendor_id,
                product_id,
            } => serde_json::to_value(self.test_usb_connection(vendor_id, product_id).await),
            BridgeRequest::TestPrint => serde_json::to_value(self.test_print().await),
            BridgeRequest::GetStats => serde_json::to_value(self.get_stats()),
            BridgeRequest::Reconnect => Ok(Value::Bool(self.reconnect().await)),
            BridgeRequest::SyncPrinters => serde_json::to_value(self.sync_printers().await),
        };
        result.unwrap_or_else(|e| json!({ "success": false, "error": e.to_string() }))
    }

    /// Handle one request line and build the reply line.
    pub async fn handle_line(&self, line: &str) -> Value {
        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => return json!({ "id": null, "error": format!("invalid JSON: {}", e) }),
        };
        let id = message.get("id").cloned().unwrap_or(Value::Null);

        match serde_json::from_value::<BridgeRequest>(message) {
            Ok(request) => json!({ "id": id, "result": self.handle(request).await }),
            Err(e) => json!({ "id": id, "error": format!("invalid request: {}", e) }),
        }
    }

    /// Serve requests from `reader` and write replies and events to
    /// `writer` until the reader is exhausted.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut events = self.subscribe();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let reply = self.handle_line(&line).await;
                    write_line(&mut writer, &reply).await?;
                }
                event = events.recv() => match event {
                    Ok(event) => {
                        let message = serde_json::to_value(&event).unwrap_or(Value::Null);
                        write_line(&mut writer, &message).await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Bridge fell behind on agent events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        debug!("Bridge input closed");
        Ok(())
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> std::io::Result<()> {
    let mut line = message.to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

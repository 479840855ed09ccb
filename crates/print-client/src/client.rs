//! HTTP client for the print service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use print_core::{
    AgentStatus, ConnectionStatus, HeartbeatPayload, HeartbeatRecord, NewPrintLog, PrintConfig,
    PrintEventType, PrintLogEntry, PrintOrder, PrintSettings, PrintSettingsPatch, PrinterSyncRequest,
    PrinterSyncResult, SystemPrinter,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Answer to an accepted heartbeat.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatAck {
    pub success: bool,
    pub heartbeat: HeartbeatRecord,
}

/// Agents of a restaurant as reported by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatList {
    pub status: ConnectionStatus,
    pub agents: Vec<AgentStatus>,
    /// Most recently seen first.
    pub heartbeats: Vec<HeartbeatRecord>,
}

#[derive(Debug, Deserialize)]
struct PendingOrders {
    orders: Vec<PrintOrder>,
}

#[derive(Debug, Deserialize)]
struct MarkPrintedAck {
    marked: usize,
}

#[derive(Debug, Deserialize)]
struct ClearPendingAck {
    cleared: u64,
}

#[derive(Debug, Deserialize)]
struct PrintLogs {
    logs: Vec<PrintLogEntry>,
}

#[derive(Debug, Deserialize)]
struct PrintIntentAck {
    dispatched: bool,
}

#[derive(Debug, Serialize)]
struct SettingsUpdate<'a> {
    restaurant_id: &'a str,
    #[serde(flatten)]
    patch: &'a PrintSettingsPatch,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the print service.
#[derive(Clone)]
pub struct CloudClient {
    http: Client,
    config: ClientConfig,
    connected: Arc<AtomicBool>,
}

impl CloudClient {
    /// Create a client. No request is made until the first call.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            http,
            config,
            connected: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Whether the last request reached the service.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Perform a health check against the service.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self.send(self.http.get(self.config.health_url())).await?;
        Ok(response.status().is_success())
    }

    /// Report liveness of an agent.
    pub async fn send_heartbeat(&self, payload: &HeartbeatPayload) -> Result<HeartbeatAck> {
        let request = self.http.post(self.config.heartbeat_url()).json(payload);
        parse(self.send(request).await?).await
    }

    /// List the agents of a restaurant.
    pub async fn fetch_heartbeats(&self, restaurant_id: &str) -> Result<HeartbeatList> {
        let request = self.http.get(self.config.heartbeats_url(restaurant_id));
        parse(self.send(request).await?).await
    }

    /// Fetch restaurant identity, receipt settings and printers.
    pub async fn fetch_print_config(&self, restaurant_id: &str) -> Result<PrintConfig> {
        let request = self.http.get(self.config.print_config_url(restaurant_id));
        parse(self.send(request).await?).await
    }

    /// Report the spooler printers found on an agent's machine.
    pub async fn sync_printers(
        &self,
        restaurant_id: &str,
        client_id: &str,
        printers: &[SystemPrinter],
    ) -> Result<PrinterSyncResult> {
        let request = self.http.post(self.config.printer_sync_url()).json(&PrinterSyncRequest {
            restaurant_id: restaurant_id.to_string(),
            client_id: client_id.to_string(),
            printers: printers.to_vec(),
        });
        parse(self.send(request).await?).await
    }

    /// Orders waiting to be printed, oldest first.
    pub async fn fetch_pending_orders(&self, restaurant_id: &str) -> Result<Vec<PrintOrder>> {
        let request = self.http.get(self.config.print_orders_url(restaurant_id, "get"));
        let pending: PendingOrders = parse(self.send(request).await?).await?;
        Ok(pending.orders)
    }

    /// Mark orders as printed. Returns how many were updated.
    pub async fn mark_printed(&self, restaurant_id: &str, order_ids: &[String]) -> Result<usize> {
        let request = self
            .http
            .post(self.config.print_orders_url(restaurant_id, "mark-printed"))
            .json(&serde_json::json!({ "order_ids": order_ids }));
        let ack: MarkPrintedAck = parse(self.send(request).await?).await?;
        Ok(ack.marked)
    }

    /// Put an order back in the queue.
    pub async fn reprint(&self, restaurant_id: &str, order_id: &str) -> Result<()> {
        let request = self
            .http
            .post(self.config.print_orders_url(restaurant_id, "reprint"))
            .json(&serde_json::json!({ "order_id": order_id }));
        let _: serde_json::Value = parse(self.send(request).await?).await?;
        Ok(())
    }

    /// Empty the print queue. Returns how many orders were cleared.
    pub async fn clear_pending(&self, restaurant_id: &str) -> Result<u64> {
        let request = self
            .http
            .post(self.config.print_orders_url(restaurant_id, "clear-pending"));
        let ack: ClearPendingAck = parse(self.send(request).await?).await?;
        Ok(ack.cleared)
    }

    /// Ask for an order to be printed. Returns whether it was queued.
    pub async fn create_print_intent(
        &self,
        restaurant_id: &str,
        order_id: &str,
        event_type: PrintEventType,
    ) -> Result<bool> {
        let request = self.http.post(self.config.print_intents_url()).json(&serde_json::json!({
            "restaurant_id": restaurant_id,
            "order_id": order_id,
            "event_type": event_type,
        }));
        let ack: PrintIntentAck = parse(self.send(request).await?).await?;
        Ok(ack.dispatched)
    }

    /// Record a print attempt.
    pub async fn record_print_log(&self, log: &NewPrintLog) -> Result<PrintLogEntry> {
        let request = self.http.post(self.config.print_logs_url()).json(log);
        parse(self.send(request).await?).await
    }

    /// Recent print attempts of a restaurant, newest first.
    pub async fn list_print_logs(&self, restaurant_id: &str, limit: u32) -> Result<Vec<PrintLogEntry>> {
        let limit = limit.to_string();
        let request = self
            .http
            .get(self.config.print_logs_url())
            .query(&[("restaurant_id", restaurant_id), ("limit", limit.as_str())]);
        let logs: PrintLogs = parse(self.send(request).await?).await?;
        Ok(logs.logs)
    }

    pub async fn get_print_settings(&self, restaurant_id: &str) -> Result<PrintSettings> {
        let request = self
            .http
            .get(self.config.print_settings_url())
            .query(&[("restaurant_id", restaurant_id)]);
        parse(self.send(request).await?).await
    }

    /// Apply a partial settings update and return the stored result.
    pub async fn update_print_settings(
        &self,
        restaurant_id: &str,
        patch: &PrintSettingsPatch,
    ) -> Result<PrintSettings> {
        let request = self
            .http
            .put(self.config.print_settings_url())
            .json(&SettingsUpdate { restaurant_id, patch });
        parse(self.send(request).await?).await
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request and track whether the service was reachable.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        match request.send().await {
            Ok(response) => {
                self.connected.store(true, Ordering::SeqCst);
                debug!(status = %response.status(), url = %response.url(), "Response");
                Ok(response)
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(ClientError::Http(e))
            }
        }
    }
}

/// Decode a JSON body, turning error statuses into [`ClientError::Status`].
async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

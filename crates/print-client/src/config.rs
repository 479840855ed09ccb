//! Configuration types for the print client.

use std::time::Duration;

/// Configuration for connecting to the print service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the print service (e.g., "http://localhost:8790").
    pub base_url: String,
    /// Timeout applied to every request except the change feed.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn heartbeat_url(&self) -> String {
        format!("{}/api/printer-heartbeat", self.base_url)
    }

    pub fn heartbeats_url(&self, restaurant_id: &str) -> String {
        format!(
            "{}/api/heartbeats?restaurant_id={}",
            self.base_url,
            urlencoding::encode(restaurant_id)
        )
    }

    pub fn print_config_url(&self, restaurant_id: &str) -> String {
        format!(
            "{}/api/printer-config?restaurant_id={}",
            self.base_url,
            urlencoding::encode(restaurant_id)
        )
    }

    /// Print queue URL for one action (`get`, `mark-printed`, `reprint`, `clear-pending`).
    pub fn print_orders_url(&self, restaurant_id: &str, action: &str) -> String {
        format!(
            "{}/api/print-orders?restaurant_id={}&action={}",
            self.base_url,
            urlencoding::encode(restaurant_id),
            action
        )
    }

    pub fn printer_sync_url(&self) -> String {
        format!("{}/api/printer-sync", self.base_url)
    }

    pub fn print_intents_url(&self) -> String {
        format!("{}/api/print-intents", self.base_url)
    }

    pub fn print_logs_url(&self) -> String {
        format!("{}/api/print-logs", self.base_url)
    }

    pub fn print_settings_url(&self) -> String {
        format!("{}/api/print-settings", self.base_url)
    }

    /// Change feed endpoint of a restaurant.
    pub fn events_url(&self, restaurant_id: &str) -> String {
        format!(
            "{}/api/events?restaurant_id={}",
            self.base_url,
            urlencoding::encode(restaurant_id)
        )
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8790")
    }
}

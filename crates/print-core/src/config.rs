//! Print configuration aggregated for agents at startup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Paper width, in columns, given to printers registered by a sync (80 mm roll).
pub const SYNCED_PRINTER_PAPER_WIDTH: u32 = 48;

/// Identity block printed in receipt headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantInfo {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub cnpj: Option<String>,
    pub logo_url: Option<String>,
}

/// Receipt settings stored for a restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptSettings {
    /// Free-form layout object merged over the agent's default layout.
    pub print_layout: serde_json::Value,
    pub receipt_header: Option<String>,
    pub receipt_footer: Option<String>,
    pub show_address: bool,
    pub show_phone: bool,
    pub show_cnpj: bool,
}

impl Default for ReceiptSettings {
    fn default() -> Self {
        Self {
            print_layout: serde_json::Value::Object(Default::default()),
            receipt_header: None,
            receipt_footer: None,
            show_address: true,
            show_phone: true,
            show_cnpj: false,
        }
    }
}

/// A printer configured cloud-side for a restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterConfig {
    pub id: String,
    pub name: String,
    /// Spooler name on the agent machine.
    pub printer_name: Option<String>,
    pub paper_width: Option<u32>,
    pub linked_order_types: Vec<String>,
    pub is_active: bool,
}

impl PrinterConfig {
    pub fn handles(&self, order_type: &str) -> bool {
        self.linked_order_types.iter().any(|t| t == order_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: String,
    pub name: String,
}

/// Everything an agent needs to print for a restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintConfig {
    pub restaurant: RestaurantInfo,
    pub settings: ReceiptSettings,
    pub printers: Vec<PrinterConfig>,
    pub categories: Vec<CategoryInfo>,
}

/// A spooler printer reported by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPrinter {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Driver or model description.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl SystemPrinter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            is_default: false,
        }
    }

    /// Name shown on the dashboard.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// Printers an agent found on its machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterSyncRequest {
    pub restaurant_id: String,
    pub client_id: String,
    #[serde(default)]
    pub printers: Vec<SystemPrinter>,
}

impl PrinterSyncRequest {
    pub fn validate(&self) -> Result<()> {
        if self.restaurant_id.trim().is_empty() {
            return Err(CoreError::MissingField("restaurant_id"));
        }
        if self.client_id.trim().is_empty() {
            return Err(CoreError::MissingField("client_id"));
        }
        if let Some(printer) = self.printers.iter().find(|p| p.name.trim().is_empty()) {
            return Err(CoreError::InvalidValue {
                field: "printers.name",
                value: printer.name.clone(),
            });
        }
        Ok(())
    }
}

/// Outcome of a printer sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterSyncResult {
    pub success: bool,
    /// Printers recorded as available.
    pub synced: u32,
    /// Printers newly added to the restaurant's configuration.
    pub registered: u32,
}

/// A printer last reported by an agent of the restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailablePrinter {
    pub printer_name: String,
    pub display_name: String,
    pub driver_name: Option<String>,
    pub is_default: bool,
    pub client_id: String,
    pub last_seen_at: DateTime<Utc>,
}

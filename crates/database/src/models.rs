//! Database models.
//!
//! Timestamps are stored as unix milliseconds and exposed as `i64`; the
//! conversions into `print_core` types turn them into `DateTime<Utc>`.

use chrono::{DateTime, Utc};
use print_core::{
    AvailablePrinter, CategoryInfo, HeartbeatRecord, PrintLogEntry, PrintOrder, PrintOrderItem, PrintSettings,
    PrinterConfig, ReceiptSettings, RestaurantInfo,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{DatabaseError, Result};

/// Convert stored milliseconds to a UTC timestamp.
pub fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// A restaurant, the owner of agents, orders and settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub cnpj: Option<String>,
    pub logo_url: Option<String>,
}

impl From<Restaurant> for RestaurantInfo {
    fn from(row: Restaurant) -> Self {
        RestaurantInfo {
            id: row.id,
            name: row.name,
            phone: row.phone,
            address: row.address,
            cnpj: row.cnpj,
            logo_url: row.logo_url,
        }
    }
}

/// Last heartbeat of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PrinterHeartbeat {
    pub restaurant_id: String,
    pub client_id: String,
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub platform: Option<String>,
    pub printers_count: i64,
    pub is_printing: bool,
    pub pending_orders: i64,
    /// Server time of the latest heartbeat, never decreasing.
    pub last_heartbeat_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<PrinterHeartbeat> for HeartbeatRecord {
    fn from(row: PrinterHeartbeat) -> Self {
        HeartbeatRecord {
            restaurant_id: row.restaurant_id,
            client_id: row.client_id,
            client_name: row.client_name,
            client_version: row.client_version,
            platform: row.platform,
            printers_count: u32::try_from(row.printers_count).ok(),
            is_printing: Some(row.is_printing),
            pending_orders: u32::try_from(row.pending_orders).ok(),
            last_heartbeat_at: timestamp(row.last_heartbeat_at),
        }
    }
}

/// A print log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PrintLogRow {
    pub id: i64,
    pub restaurant_id: String,
    pub order_id: String,
    pub order_number: Option<String>,
    pub printer_name: Option<String>,
    pub items_count: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub event_type: String,
    pub created_at: i64,
}

impl TryFrom<PrintLogRow> for PrintLogEntry {
    type Error = DatabaseError;

    fn try_from(row: PrintLogRow) -> Result<Self> {
        Ok(PrintLogEntry {
            id: row.id,
            status: row.status.parse()?,
            event_type: row.event_type.parse()?,
            restaurant_id: row.restaurant_id,
            order_id: row.order_id,
            order_number: row.order_number,
            printer_name: row.printer_name,
            items_count: u32::try_from(row.items_count).unwrap_or(0),
            error_message: row.error_message,
            created_at: timestamp(row.created_at),
        })
    }
}

/// Stored auto-print switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PrintSettingsRow {
    pub restaurant_id: String,
    pub auto_print_counter: bool,
    pub auto_print_table: bool,
    pub auto_print_delivery: bool,
    pub updated_at: i64,
}

impl From<PrintSettingsRow> for PrintSettings {
    fn from(row: PrintSettingsRow) -> Self {
        PrintSettings {
            auto_print_counter: row.auto_print_counter,
            auto_print_table: row.auto_print_table,
            auto_print_delivery: row.auto_print_delivery,
        }
    }
}

/// An order row, limited to what printing needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderRow {
    pub id: String,
    pub restaurant_id: String,
    pub order_number: Option<i64>,
    pub order_type: Option<String>,
    pub customer_name: Option<String>,
    pub total: Option<f64>,
    pub notes: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_phone: Option<String>,
    pub delivery_fee: Option<f64>,
    pub table_number: Option<i64>,
    pub waiter_name: Option<String>,
    pub print_status: String,
    pub print_event: Option<String>,
    pub printed_at: Option<i64>,
    pub print_count: i64,
    pub created_at: i64,
}

impl OrderRow {
    /// Build the agent-facing view with the given items.
    pub fn into_print_order(self, items: Vec<OrderItemRow>) -> Result<PrintOrder> {
        let print_event = match self.print_event.as_deref() {
            Some(event) => event.parse()?,
            None => Default::default(),
        };

        Ok(PrintOrder {
            id: self.id,
            order_number: self.order_number,
            created_at: timestamp(self.created_at),
            customer_name: self.customer_name,
            order_type: self.order_type,
            total: self.total,
            notes: self.notes,
            delivery_address: self.delivery_address,
            delivery_phone: self.delivery_phone,
            delivery_fee: self.delivery_fee,
            table_number: self.table_number,
            waiter_name: self.waiter_name,
            print_event,
            order_items: items.into_iter().map(PrintOrderItem::from).collect(),
        })
    }
}

/// A line item of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderItemRow {
    pub id: String,
    pub order_id: String,
    pub product_name: String,
    pub product_size: Option<String>,
    pub quantity: i64,
    pub notes: Option<String>,
    pub product_price: f64,
    pub category_id: Option<String>,
    pub position: i64,
}

impl From<OrderItemRow> for PrintOrderItem {
    fn from(row: OrderItemRow) -> Self {
        PrintOrderItem {
            id: row.id,
            product_name: row.product_name,
            product_size: row.product_size,
            quantity: row.quantity,
            notes: row.notes,
            product_price: row.product_price,
            category_id: row.category_id,
        }
    }
}

/// A printer configured for a restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PrinterRow {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub printer_name: Option<String>,
    pub paper_width: Option<i64>,
    /// JSON array of order types.
    pub linked_order_types: String,
    pub is_active: bool,
}

impl From<PrinterRow> for PrinterConfig {
    fn from(row: PrinterRow) -> Self {
        let linked_order_types = serde_json::from_str(&row.linked_order_types).unwrap_or_else(|e| {
            tracing::warn!(printer = %row.id, error = %e, "Invalid linked_order_types, using all");
            vec!["counter".to_string(), "table".to_string(), "delivery".to_string()]
        });

        PrinterConfig {
            id: row.id,
            name: row.name,
            printer_name: row.printer_name,
            paper_width: row.paper_width.and_then(|w| u32::try_from(w).ok()),
            linked_order_types,
            is_active: row.is_active,
        }
    }
}

/// A spooler printer reported by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AvailablePrinterRow {
    pub restaurant_id: String,
    pub printer_name: String,
    pub display_name: String,
    pub driver_name: Option<String>,
    pub is_default: bool,
    pub client_id: String,
    pub last_seen_at: i64,
}

impl From<AvailablePrinterRow> for AvailablePrinter {
    fn from(row: AvailablePrinterRow) -> Self {
        AvailablePrinter {
            printer_name: row.printer_name,
            display_name: row.display_name,
            driver_name: row.driver_name,
            is_default: row.is_default,
            client_id: row.client_id,
            last_seen_at: timestamp(row.last_seen_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CategoryRow {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub sort_order: i64,
}

impl From<CategoryRow> for CategoryInfo {
    fn from(row: CategoryRow) -> Self {
        CategoryInfo {
            id: row.id,
            name: row.name,
        }
    }
}

/// Receipt layout and header options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ReceiptSettingsRow {
    pub restaurant_id: String,
    /// JSON object.
    pub print_layout: String,
    pub receipt_header: Option<String>,
    pub receipt_footer: Option<String>,
    pub show_address: bool,
    pub show_phone: bool,
    pub show_cnpj: bool,
}

impl From<ReceiptSettingsRow> for ReceiptSettings {
    fn from(row: ReceiptSettingsRow) -> Self {
        let print_layout = match serde_json::from_str::<serde_json::Value>(&row.print_layout) {
            Ok(value) if value.is_object() => value,
            _ => serde_json::Value::Object(Default::default()),
        };

        ReceiptSettings {
            print_layout,
            receipt_header: row.receipt_header,
            receipt_footer: row.receipt_footer,
            show_address: row.show_address,
            show_phone: row.show_phone,
            show_cnpj: row.show_cnpj,
        }
    }
}

//! Print-queue view of orders.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::print_log::PrintEventType;
use crate::settings::OrderType;

/// Print status of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPrintStatus {
    /// Not queued for printing.
    #[default]
    None,
    /// Waiting for an agent.
    Pending,
    Printed,
}

impl OrderPrintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Printed => "printed",
        }
    }
}

impl FromStr for OrderPrintStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "pending" => Ok(Self::Pending),
            "printed" => Ok(Self::Printed),
            other => Err(CoreError::InvalidValue {
                field: "print_status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrderPrintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an order update moved the print status *into* `printed`.
///
/// Both sides must be known and different. An insert (no old value) or an
/// update that leaves an already printed order printed does not qualify.
pub fn is_printed_transition(old: Option<&str>, new: Option<&str>) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => old != new && new == OrderPrintStatus::Printed.as_str(),
        _ => false,
    }
}

/// An order as handed to a print agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintOrder {
    pub id: String,
    pub order_number: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub order_type: Option<String>,
    pub total: Option<f64>,
    pub notes: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_phone: Option<String>,
    pub delivery_fee: Option<f64>,
    pub table_number: Option<i64>,
    pub waiter_name: Option<String>,
    /// What queued the order; recorded on the resulting log entry.
    #[serde(default)]
    pub print_event: PrintEventType,
    #[serde(default)]
    pub order_items: Vec<PrintOrderItem>,
}

impl PrintOrder {
    pub fn order_type(&self) -> OrderType {
        OrderType::from_optional(self.order_type.as_deref())
    }

    /// Human-facing number: the order number, else the id prefix.
    pub fn display_number(&self) -> String {
        match self.order_number {
            Some(number) => number.to_string(),
            None => self.id.chars().take(8).collect(),
        }
    }

    /// Label used in agent logs, e.g. `#42`.
    pub fn label(&self) -> String {
        format!("#{}", self.display_number())
    }

    pub fn items_count(&self) -> u32 {
        self.order_items.len() as u32
    }
}

/// A line item of a [`PrintOrder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintOrderItem {
    pub id: String,
    pub product_name: String,
    pub product_size: Option<String>,
    pub quantity: i64,
    pub notes: Option<String>,
    pub product_price: f64,
    pub category_id: Option<String>,
}

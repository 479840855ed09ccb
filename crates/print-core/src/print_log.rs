//! Print log entries: one per physical print attempt.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Outcome of a print attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintOutcome {
    Success,
    Error,
}

impl PrintOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl FromStr for PrintOutcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(CoreError::InvalidValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PrintOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What triggered a print attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintEventType {
    #[default]
    Print,
    Reprint,
    AutoPrint,
}

impl PrintEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Reprint => "reprint",
            Self::AutoPrint => "auto_print",
        }
    }
}

impl FromStr for PrintEventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "print" => Ok(Self::Print),
            "reprint" => Ok(Self::Reprint),
            "auto_print" => Ok(Self::AutoPrint),
            other => Err(CoreError::InvalidValue {
                field: "event_type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PrintEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A print attempt to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPrintLog {
    pub restaurant_id: String,
    pub order_id: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub printer_name: Option<String>,
    #[serde(default)]
    pub items_count: u32,
    pub status: PrintOutcome,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub event_type: PrintEventType,
}

impl NewPrintLog {
    /// A successful attempt.
    pub fn success(restaurant_id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            order_id: order_id.into(),
            order_number: None,
            printer_name: None,
            items_count: 0,
            status: PrintOutcome::Success,
            error_message: None,
            event_type: PrintEventType::Print,
        }
    }

    /// A failed attempt with its error message.
    pub fn failure(
        restaurant_id: impl Into<String>,
        order_id: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            status: PrintOutcome::Error,
            error_message: Some(error_message.into()),
            ..Self::success(restaurant_id, order_id)
        }
    }

    pub fn with_event_type(mut self, event_type: PrintEventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn with_printer(mut self, printer_name: impl Into<String>) -> Self {
        self.printer_name = Some(printer_name.into());
        self
    }

    pub fn with_order_number(mut self, order_number: impl Into<String>) -> Self {
        self.order_number = Some(order_number.into());
        self
    }

    pub fn with_items_count(mut self, items_count: u32) -> Self {
        self.items_count = items_count;
        self
    }

    /// Check the identity fields.
    pub fn validate(&self) -> Result<()> {
        if self.restaurant_id.trim().is_empty() {
            return Err(CoreError::MissingField("restaurant_id"));
        }
        if self.order_id.trim().is_empty() {
            return Err(CoreError::MissingField("order_id"));
        }
        Ok(())
    }
}

/// A recorded print attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintLogEntry {
    pub id: i64,
    pub restaurant_id: String,
    pub order_id: String,
    pub order_number: Option<String>,
    pub printer_name: Option<String>,
    pub items_count: u32,
    pub status: PrintOutcome,
    pub error_message: Option<String>,
    pub event_type: PrintEventType,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_builder() {
        let log = NewPrintLog::failure("r1", "o1", "paper jam")
            .with_event_type(PrintEventType::AutoPrint)
            .with_printer("EPSON TM-T20")
            .with_items_count(4);
        assert_eq!(log.status, PrintOutcome::Error);
        assert_eq!(log.error_message.as_deref(), Some("paper jam"));
        assert_eq!(log.event_type, PrintEventType::AutoPrint);
        assert_eq!(log.items_count, 4);
    }

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&PrintEventType::AutoPrint).unwrap(),
            "\"auto_print\""
        );
        assert_eq!("reprint".parse::<PrintEventType>(), Ok(PrintEventType::Reprint));
        assert!("bogus".parse::<PrintEventType>().is_err());
        assert!("pending".parse::<PrintOutcome>().is_err());
    }

    #[test]
    fn test_new_log_defaults() {
        let log: NewPrintLog = serde_json::from_str(
            r#"{"restaurant_id": "r1", "order_id": "o1", "status": "success"}"#,
        )
        .unwrap();
        assert_eq!(log.event_type, PrintEventType::Print);
        assert_eq!(log.items_count, 0);
        assert!(log.validate().is_ok());
    }
}

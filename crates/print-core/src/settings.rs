//! Auto-print policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of order, as far as printing is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Counter,
    Table,
    Delivery,
    /// Any type the policy has no switch for (e.g. "tab", "conference").
    #[serde(untagged)]
    Other(String),
}

impl OrderType {
    /// Parse an optional order type, treating a missing value as counter.
    pub fn from_optional(value: Option<&str>) -> Self {
        value.map_or(Self::Counter, Self::parse)
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "counter" => Self::Counter,
            "table" => Self::Table,
            "delivery" => Self::Delivery,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Counter => "counter",
            Self::Table => "table",
            Self::Delivery => "delivery",
            Self::Other(other) => other,
        }
    }
}

impl FromStr for OrderType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-restaurant auto-print switches. Every switch defaults to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintSettings {
    #[serde(default = "default_true")]
    pub auto_print_counter: bool,
    #[serde(default = "default_true")]
    pub auto_print_table: bool,
    #[serde(default = "default_true")]
    pub auto_print_delivery: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            auto_print_counter: true,
            auto_print_table: true,
            auto_print_delivery: true,
        }
    }
}

impl PrintSettings {
    /// Whether an order of this type is printed without operator action.
    ///
    /// Types without a switch always print.
    pub fn should_auto_print(&self, order_type: &OrderType) -> bool {
        match order_type {
            OrderType::Counter => self.auto_print_counter,
            OrderType::Table => self.auto_print_table,
            OrderType::Delivery => self.auto_print_delivery,
            OrderType::Other(_) => true,
        }
    }

    /// Apply a partial update; absent fields keep their current value.
    pub fn apply(&self, patch: &PrintSettingsPatch) -> Self {
        Self {
            auto_print_counter: patch.auto_print_counter.unwrap_or(self.auto_print_counter),
            auto_print_table: patch.auto_print_table.unwrap_or(self.auto_print_table),
            auto_print_delivery: patch.auto_print_delivery.unwrap_or(self.auto_print_delivery),
        }
    }
}

/// Partial update of [`PrintSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintSettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_print_counter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_print_table: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_print_delivery: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_fails_open() {
        let settings = PrintSettings {
            auto_print_counter: false,
            auto_print_table: false,
            auto_print_delivery: false,
        };
        assert!(settings.should_auto_print(&OrderType::parse("conference")));
        assert!(settings.should_auto_print(&OrderType::Other(String::new())));
    }

    #[test]
    fn test_known_types_follow_switches() {
        let settings = PrintSettings {
            auto_print_table: false,
            ..Default::default()
        };
        assert!(settings.should_auto_print(&OrderType::Counter));
        assert!(!settings.should_auto_print(&OrderType::Table));
        assert!(settings.should_auto_print(&OrderType::Delivery));
    }

    #[test]
    fn test_apply_is_partial() {
        let current = PrintSettings {
            auto_print_delivery: false,
            ..Default::default()
        };
        let patch = PrintSettingsPatch {
            auto_print_table: Some(false),
            ..Default::default()
        };
        let updated = current.apply(&patch);
        assert!(updated.auto_print_counter);
        assert!(!updated.auto_print_table);
        assert!(!updated.auto_print_delivery);
    }

    #[test]
    fn test_order_type_parse_and_serde() {
        assert_eq!(OrderType::from_optional(None), OrderType::Counter);
        assert_eq!(OrderType::parse("table"), OrderType::Table);
        assert_eq!(OrderType::parse("tab").as_str(), "tab");

        let parsed: OrderType = serde_json::from_str("\"delivery\"").unwrap();
        assert_eq!(parsed, OrderType::Delivery);
        let other: OrderType = serde_json::from_str("\"conference\"").unwrap();
        assert_eq!(other, OrderType::Other("conference".to_string()));
    }

    #[test]
    fn test_settings_deserialize_missing_fields_default_true() {
        let settings: PrintSettings =
            serde_json::from_str(r#"{"auto_print_table": false}"#).unwrap();
        assert!(settings.auto_print_counter);
        assert!(!settings.auto_print_table);
        assert!(settings.auto_print_delivery);
    }
}

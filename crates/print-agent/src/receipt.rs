//! Receipt layout and plain-text rendering.
//!
//! A receipt is a list of lines already padded to the paper width. Rendering
//! to ESC/POS only adds emphasis, feed and cut around those lines.

use chrono::{DateTime, Local, Utc};
use print_core::{OrderType, PrintOrder, RestaurantInfo};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::escpos::{EscPosBuilder, TextSize, FEED_BEFORE_CUT};

/// Characters per line on 80 mm paper.
pub const DEFAULT_PAPER_WIDTH: usize = 48;

/// Narrowest width a receipt is rendered at.
pub const MIN_PAPER_WIDTH: usize = 24;

/// Widest width a receipt is rendered at.
pub const MAX_PAPER_WIDTH: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperCut {
    Full,
    #[default]
    Partial,
    None,
}

/// Which parts of a receipt are printed, and how.
///
/// Stored camelCase so that layouts saved by the dashboard can be merged in
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintLayout {
    pub paper_width: usize,
    pub paper_cut: PaperCut,
    pub show_date_time: bool,
    pub show_restaurant_name: bool,
    pub show_address: bool,
    pub show_phone: bool,
    pub show_cnpj: bool,
    pub receipt_title: Option<String>,
    pub show_order_number: bool,
    pub show_order_type: bool,
    pub show_table: bool,
    pub show_waiter: bool,
    pub show_customer_name: bool,
    pub show_customer_phone: bool,
    pub show_delivery_address: bool,
    pub show_item_prices: bool,
    pub show_item_notes: bool,
    pub show_item_size: bool,
    pub show_totals: bool,
    pub show_delivery_fee: bool,
    pub bold_items: bool,
    pub bold_total: bool,
    pub footer_message: Option<String>,
    pub custom_footer_lines: Vec<String>,
    pub open_drawer: bool,
}

impl Default for PrintLayout {
    fn default() -> Self {
        Self {
            paper_width: DEFAULT_PAPER_WIDTH,
            paper_cut: PaperCut::Partial,
            show_date_time: true,
            show_restaurant_name: true,
            show_address: false,
            show_phone: false,
            show_cnpj: false,
            receipt_title: Some("*** ORDER ***".to_string()),
            show_order_number: true,
            show_order_type: true,
            show_table: true,
            show_waiter: true,
            show_customer_name: true,
            show_customer_phone: true,
            show_delivery_address: true,
            show_item_prices: true,
            show_item_notes: true,
            show_item_size: true,
            show_totals: true,
            show_delivery_fee: true,
            bold_items: true,
            bold_total: true,
            footer_message: Some("Thank you!".to_string()),
            custom_footer_lines: Vec::new(),
            open_drawer: false,
        }
    }
}

impl PrintLayout {
    /// Overlay the keys of a stored layout object on this layout.
    ///
    /// Unknown keys are ignored. An override that does not fit the layout
    /// leaves it unchanged.
    pub fn merged(&self, overrides: &serde_json::Value) -> Self {
        let Some(overrides) = overrides.as_object().filter(|o| !o.is_empty()) else {
            return self.clone();
        };

        let mut base = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return self.clone(),
        };
        for (key, value) in overrides {
            base.insert(key.clone(), value.clone());
        }

        match serde_json::from_value(serde_json::Value::Object(base)) {
            Ok(layout) => layout,
            Err(e) => {
                warn!(error = %e, "Ignoring invalid print layout");
                self.clone()
            }
        }
    }

    /// Same layout at another paper width, kept within the printable range.
    pub fn with_paper_width(&self, width: usize) -> Self {
        Self {
            paper_width: width.clamp(MIN_PAPER_WIDTH, MAX_PAPER_WIDTH),
            ..self.clone()
        }
    }

    fn width(&self) -> usize {
        self.paper_width.clamp(MIN_PAPER_WIDTH, MAX_PAPER_WIDTH)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Emphasis {
    #[default]
    Normal,
    Bold,
    /// Bold at double height.
    Large,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub emphasis: Emphasis,
}

/// A rendered receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    pub lines: Vec<Line>,
}

impl Receipt {
    fn push(&mut self, text: impl Into<String>) {
        self.push_with(text, Emphasis::Normal);
    }

    fn push_with(&mut self, text: impl Into<String>, emphasis: Emphasis) {
        self.lines.push(Line {
            text: text.into(),
            emphasis,
        });
    }

    fn blank(&mut self) {
        self.push("");
    }

    /// Plain text, one line per receipt line.
    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// ESC/POS bytes ready for a raw printer queue or device.
    pub fn to_escpos(&self, layout: &PrintLayout) -> Vec<u8> {
        let mut builder = EscPosBuilder::new();
        for line in &self.lines {
            let text = sanitize_text(&line.text);
            match line.emphasis {
                Emphasis::Normal => {
                    builder.line(&text);
                }
                Emphasis::Bold => {
                    builder.bold(true).line(&text).bold(false);
                }
                Emphasis::Large => {
                    builder
                        .bold(true)
                        .size(TextSize::DoubleHeight)
                        .line(&text)
                        .size(TextSize::Normal)
                        .bold(false);
                }
            }
        }

        builder.feed(FEED_BEFORE_CUT);
        match layout.paper_cut {
            PaperCut::Full => {
                builder.cut(true);
            }
            PaperCut::Partial => {
                builder.cut(false);
            }
            PaperCut::None => {}
        }
        if layout.open_drawer {
            builder.kick_drawer();
        }
        builder.build()
    }
}

/// Replace accented Latin letters with their base letter and drop anything
/// else outside printable ASCII.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            let mapped = match c {
                'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
                'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
                'é' | 'è' | 'ê' | 'ë' => 'e',
                'É' | 'È' | 'Ê' | 'Ë' => 'E',
                'í' | 'ì' | 'î' | 'ï' => 'i',
                'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
                'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
                'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
                'ú' | 'ù' | 'û' | 'ü' => 'u',
                'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
                'ç' => 'c',
                'Ç' => 'C',
                'ñ' => 'n',
                'Ñ' => 'N',
                c => c,
            };
            (' '..='~').contains(&mapped).then_some(mapped)
        })
        .collect()
}

/// Center text in `width` columns, truncating when it does not fit.
pub fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }
    let left = (width - len) / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(width - left - len))
}

/// Put `left` and `right` on the same line, flush to both edges.
pub fn align_both(left: &str, right: &str, width: usize) -> String {
    let left_len = left.chars().count();
    let right_len = right.chars().count();
    if left_len + right_len >= width {
        return format!("{} {}", left, right).chars().take(width).collect();
    }
    format!("{}{}{}", left, " ".repeat(width - left_len - right_len), right)
}

/// Greedy word wrap. Words longer than the width are kept whole.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed <= width || current.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Brazilian real with comma decimals, e.g. `R$ 12,50`.
pub fn format_money(value: f64) -> String {
    let formatted = format!("{:.2}", value).replace('.', ",");
    format!("R$ {}", formatted)
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string()
}

fn order_type_label(order_type: &OrderType) -> String {
    match order_type {
        OrderType::Counter => "COUNTER".to_string(),
        OrderType::Table => "TABLE".to_string(),
        OrderType::Delivery => "DELIVERY".to_string(),
        OrderType::Other(other) => other.to_uppercase(),
    }
}

/// Render the kitchen/customer receipt of an order.
pub fn render_order(order: &PrintOrder, layout: &PrintLayout, restaurant: &RestaurantInfo) -> Receipt {
    let width = layout.width();
    let divider = "=".repeat(width);
    let thin_divider = "-".repeat(width);
    let mut receipt = Receipt::default();

    if layout.show_date_time {
        receipt.push(center(&format_timestamp(order.created_at), width));
    }
    if layout.show_restaurant_name && !restaurant.name.is_empty() {
        receipt.push_with(
            center(&sanitize_text(&restaurant.name.to_uppercase()), width),
            Emphasis::Bold,
        );
    }
    if layout.show_address {
        if let Some(address) = restaurant.address.as_deref() {
            for line in wrap_text(&sanitize_text(address), width) {
                receipt.push(center(&line, width));
            }
        }
    }
    if layout.show_phone {
        if let Some(phone) = restaurant.phone.as_deref() {
            receipt.push(center(&format!("Tel: {}", phone), width));
        }
    }
    if layout.show_cnpj {
        if let Some(cnpj) = restaurant.cnpj.as_deref() {
            receipt.push(center(&format!("CNPJ: {}", cnpj), width));
        }
    }
    receipt.push(divider.clone());

    if let Some(title) = layout.receipt_title.as_deref().filter(|t| !t.is_empty()) {
        receipt.push(center(&sanitize_text(title), width));
        receipt.blank();
    }
    if layout.show_order_number {
        receipt.push_with(
            center(&format!("Order #{}", order.display_number().to_uppercase()), width),
            Emphasis::Large,
        );
    }
    receipt.blank();

    if layout.show_order_type {
        receipt.push(format!("Type: {}", order_type_label(&order.order_type())));
    }
    if layout.show_table {
        if let Some(table) = order.table_number {
            receipt.push(format!("Table {}", table));
        }
    }
    if layout.show_waiter {
        if let Some(waiter) = order.waiter_name.as_deref() {
            receipt.push(format!("Waiter: {}", sanitize_text(waiter)));
        }
    }
    if layout.show_customer_name {
        if let Some(customer) = order.customer_name.as_deref() {
            receipt.push(format!("Customer: {}", sanitize_text(customer)));
        }
    }
    if layout.show_customer_phone {
        if let Some(phone) = order.delivery_phone.as_deref() {
            receipt.push(format!("Tel: {}", phone));
        }
    }
    if layout.show_delivery_address {
        if let Some(address) = order.delivery_address.as_deref() {
            let prefix = "Addr: ";
            let wrapped = wrap_text(&sanitize_text(address), width.saturating_sub(prefix.len()));
            for (i, line) in wrapped.into_iter().enumerate() {
                let lead = if i == 0 { prefix.to_string() } else { " ".repeat(prefix.len()) };
                receipt.push(format!("{}{}", lead, line));
            }
        }
    }

    receipt.blank();
    receipt.push(divider.clone());
    receipt.push("ITEMS:");
    receipt.push(thin_divider.clone());

    let item_emphasis = if layout.bold_items { Emphasis::Bold } else { Emphasis::Normal };
    for item in &order.order_items {
        let quantity = item.quantity.max(1);
        let mut name = sanitize_text(&item.product_name);
        if layout.show_item_size {
            if let Some(size) = item.product_size.as_deref().filter(|s| !s.is_empty()) {
                let tag = format!("({})", size);
                if !name.to_lowercase().contains(&tag.to_lowercase()) {
                    name = format!("{} {}", name, tag);
                }
            }
        }

        let text = format!("({}) {}", quantity, name);
        let price = if layout.show_item_prices {
            format_money(item.product_price * quantity as f64)
        } else {
            String::new()
        };

        if text.chars().count() + price.len() < width {
            receipt.push_with(align_both(&text, &price, width), item_emphasis);
        } else {
            let room = if price.is_empty() { width } else { width - price.len() - 1 };
            let wrapped = wrap_text(&text, room);
            let last = wrapped.len() - 1;
            for (i, line) in wrapped.into_iter().enumerate() {
                if i == last && !price.is_empty() {
                    receipt.push_with(align_both(&line, &price, width), item_emphasis);
                } else {
                    receipt.push_with(line, item_emphasis);
                }
            }
        }

        if layout.show_item_notes {
            if let Some(notes) = item.notes.as_deref().filter(|n| !n.is_empty()) {
                receipt.push(format!("  NOTE: {}", sanitize_text(notes)));
            }
        }
    }
    receipt.push(thin_divider);

    if let Some(notes) = order.notes.as_deref().filter(|n| !n.is_empty()) {
        receipt.blank();
        for line in wrap_text(&format!("NOTE: {}", sanitize_text(notes)), width) {
            receipt.push(line);
        }
        receipt.blank();
    }

    if layout.show_totals {
        if layout.show_delivery_fee {
            if let Some(fee) = order.delivery_fee.filter(|fee| *fee > 0.0) {
                receipt.push(align_both("Delivery fee:", &format_money(fee), width));
            }
        }
        let total_emphasis = if layout.bold_total { Emphasis::Bold } else { Emphasis::Normal };
        receipt.push_with(
            align_both("TOTAL:", &format_money(order.total.unwrap_or(0.0)), width),
            total_emphasis,
        );
    }

    receipt.blank();
    receipt.push(divider);

    if let Some(footer) = layout.footer_message.as_deref().filter(|f| !f.is_empty()) {
        receipt.push(center(&sanitize_text(footer), width));
    }
    for line in layout.custom_footer_lines.iter().filter(|l| !l.is_empty()) {
        receipt.push(center(&sanitize_text(line), width));
    }

    receipt
}

/// Render the page printed by "test print".
pub fn render_test_page(layout: &PrintLayout, printer_name: &str, now: DateTime<Utc>) -> Receipt {
    let width = layout.width();
    let mut receipt = Receipt::default();

    receipt.push_with(center("PRINT TEST", width), Emphasis::Large);
    receipt.push("=".repeat(width));
    receipt.blank();
    receipt.push(center("Printer configured!", width));
    receipt.blank();
    receipt.push(format!("Width: {} characters", width));
    receipt.push(format!("Printer: {}", printer_name));
    receipt.blank();
    receipt.push("-".repeat(width));
    receipt.push(align_both("(2) X-Burger", &format_money(29.9), width));
    receipt.push(align_both("(1) French Fries", &format_money(12.5), width));
    receipt.push(align_both("(1) Soda", &format_money(6.0), width));
    receipt.push("-".repeat(width));
    receipt.push_with(align_both("Total:", &format_money(48.4), width), Emphasis::Bold);
    receipt.push("=".repeat(width));
    receipt.blank();
    receipt.push(center(&format_timestamp(now), width));

    receipt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use print_core::PrintOrderItem;

    fn order() -> PrintOrder {
        PrintOrder {
            id: "5f0c2b9a-1111".to_string(),
            order_number: Some(42),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap(),
            customer_name: Some("João".to_string()),
            order_type: Some("delivery".to_string()),
            total: Some(65.5),
            notes: None,
            delivery_address: Some("Rua das Flores 123, Apto 4".to_string()),
            delivery_phone: Some("11 99999-0000".to_string()),
            delivery_fee: Some(5.5),
            table_number: None,
            waiter_name: None,
            print_event: Default::default(),
            order_items: vec![PrintOrderItem {
                id: "i1".to_string(),
                product_name: "Feijoada".to_string(),
                product_size: Some("G".to_string()),
                quantity: 2,
                notes: Some("sem cebola".to_string()),
                product_price: 30.0,
                category_id: None,
            }],
        }
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("Ação Pão Ñandú"), "Acao Pao Nandu");
        assert_eq!(sanitize_text("tab\there"), "tabhere");
        assert_eq!(sanitize_text("€5"), "5");
    }

    #[test]
    fn test_center() {
        assert_eq!(center("ab", 6), "  ab  ");
        assert_eq!(center("abc", 6), " abc  ");
        assert_eq!(center("abcdefgh", 4), "abcd");
    }

    #[test]
    fn test_align_both() {
        assert_eq!(align_both("TOTAL:", "R$ 1,00", 16), "TOTAL:   R$ 1,00");
        assert_eq!(align_both("long left", "right", 10), "long left ");
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("", 10), vec![""]);
        assert_eq!(wrap_text("supercalifragilistic", 5), vec!["supercalifragilistic"]);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(12.5), "R$ 12,50");
        assert_eq!(format_money(0.0), "R$ 0,00");
    }

    #[test]
    fn test_layout_merge() {
        let base = PrintLayout::default();
        let merged = base.merged(&serde_json::json!({
            "paperWidth": 32,
            "showItemPrices": false,
            "unknownKey": "ignored"
        }));
        assert_eq!(merged.paper_width, 32);
        assert!(!merged.show_item_prices);
        assert!(merged.show_totals);

        let invalid = base.merged(&serde_json::json!({ "paperWidth": "wide" }));
        assert_eq!(invalid, base);
        assert_eq!(base.merged(&serde_json::json!({})), base);
    }

    #[test]
    fn test_render_order() {
        let restaurant = RestaurantInfo {
            id: "r1".to_string(),
            name: "Cantina".to_string(),
            ..Default::default()
        };
        let layout = PrintLayout::default().with_paper_width(32);
        let receipt = render_order(&order(), &layout, &restaurant);
        let text = receipt.to_text();

        assert!(text.contains("CANTINA"));
        assert!(text.contains("Order #42"));
        assert!(text.contains("Type: DELIVERY"));
        assert!(text.contains("Customer: Joao"));
        assert!(text.contains("(2) Feijoada (G)"));
        assert!(text.contains("R$ 60,00"));
        assert!(text.contains("NOTE: sem cebola"));
        assert!(text.contains("Delivery fee:"));
        assert!(text.contains("R$ 65,50"));
        assert!(receipt.lines.iter().all(|l| l.text.chars().count() <= 32));
    }

    #[test]
    fn test_oversized_paper_width_is_capped() {
        let from_service = u32::MAX as usize;
        let layout = PrintLayout::default().with_paper_width(from_service);
        assert_eq!(layout.paper_width, MAX_PAPER_WIDTH);

        let local = PrintLayout {
            paper_width: 4_000_000_000u32 as usize,
            ..PrintLayout::default()
        };
        let receipt = render_order(&order(), &local, &RestaurantInfo::default());
        assert!(receipt.lines.iter().all(|l| l.text.chars().count() <= MAX_PAPER_WIDTH));
        assert!(!receipt.to_escpos(&local).is_empty());

        assert_eq!(PrintLayout::default().with_paper_width(3).paper_width, MIN_PAPER_WIDTH);
    }

    #[test]
    fn test_render_respects_flags() {
        let layout = PrintLayout {
            show_item_prices: false,
            show_totals: false,
            show_customer_name: false,
            ..PrintLayout::default()
        };
        let text = render_order(&order(), &layout, &RestaurantInfo::default()).to_text();
        assert!(!text.contains("R$"));
        assert!(!text.contains("Customer:"));
    }

    #[test]
    fn test_escpos_output() {
        let layout = PrintLayout {
            paper_cut: PaperCut::Full,
            open_drawer: true,
            ..PrintLayout::default()
        };
        let receipt = render_test_page(&layout, "Kitchen", Utc::now());
        let bytes = receipt.to_escpos(&layout);

        assert!(bytes.starts_with(&crate::escpos::INIT));
        assert!(bytes.ends_with(&crate::escpos::DRAWER_KICK_2));
        let cut = crate::escpos::CUT_FULL;
        assert!(bytes.windows(cut.len()).any(|w| w == cut));
        assert!(bytes.windows(10).any(|w| w == b"PRINT TEST"));
    }
}

//! Printers, categories and receipt settings, aggregated for agents.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use print_core::{
    AvailablePrinter, CategoryInfo, PrintConfig, PrinterConfig, PrinterSyncResult, ReceiptSettings,
    SystemPrinter, SYNCED_PRINTER_PAPER_WIDTH,
};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{AvailablePrinterRow, CategoryRow, PrinterRow, ReceiptSettingsRow};
use crate::restaurant::{ensure_restaurant, get_restaurant};
use crate::validation::{validate_descriptor, validate_id};

/// Create a printer.
pub async fn create_printer(pool: &SqlitePool, printer: &PrinterRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO printers (
            id, restaurant_id, name, printer_name, paper_width, linked_order_types, is_active
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&printer.id)
    .bind(&printer.restaurant_id)
    .bind(&printer.name)
    .bind(&printer.printer_name)
    .bind(printer.paper_width)
    .bind(&printer.linked_order_types)
    .bind(printer.is_active)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Printer",
                    id: printer.id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// List the active printers of a restaurant.
pub async fn list_active_printers(pool: &SqlitePool, restaurant_id: &str) -> Result<Vec<PrinterRow>> {
    let printers = sqlx::query_as::<_, PrinterRow>(
        r#"
        SELECT id, restaurant_id, name, printer_name, paper_width, linked_order_types, is_active
        FROM printers
        WHERE restaurant_id = ? AND is_active = 1
        ORDER BY name ASC, id ASC
        "#,
    )
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;

    Ok(printers)
}

/// Create a category.
pub async fn create_category(pool: &SqlitePool, category: &CategoryRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO categories (id, restaurant_id, name, sort_order)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&category.id)
    .bind(&category.restaurant_id)
    .bind(&category.name)
    .bind(category.sort_order)
    .execute(pool)
    .await?;

    Ok(())
}

/// List the categories of a restaurant by sort order.
pub async fn list_categories(pool: &SqlitePool, restaurant_id: &str) -> Result<Vec<CategoryRow>> {
    let categories = sqlx::query_as::<_, CategoryRow>(
        r#"
        SELECT id, restaurant_id, name, sort_order
        FROM categories
        WHERE restaurant_id = ?
        ORDER BY sort_order ASC, name ASC
        "#,
    )
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;

    Ok(categories)
}

/// Create or replace the receipt settings of a restaurant.
pub async fn upsert_receipt_settings(
    pool: &SqlitePool,
    restaurant_id: &str,
    settings: &ReceiptSettings,
) -> Result<()> {
    let print_layout = serde_json::to_string(&settings.print_layout)
        .map_err(|e| DatabaseError::InvalidData(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO receipt_settings (
            restaurant_id, print_layout, receipt_header, receipt_footer,
            show_address, show_phone, show_cnpj
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(restaurant_id) DO UPDATE SET
            print_layout = excluded.print_layout,
            receipt_header = excluded.receipt_header,
            receipt_footer = excluded.receipt_footer,
            show_address = excluded.show_address,
            show_phone = excluded.show_phone,
            show_cnpj = excluded.show_cnpj
        "#,
    )
    .bind(restaurant_id)
    .bind(print_layout)
    .bind(&settings.receipt_header)
    .bind(&settings.receipt_footer)
    .bind(settings.show_address)
    .bind(settings.show_phone)
    .bind(settings.show_cnpj)
    .execute(pool)
    .await?;

    Ok(())
}

/// Read the receipt settings of a restaurant, or the defaults.
pub async fn get_receipt_settings(pool: &SqlitePool, restaurant_id: &str) -> Result<ReceiptSettings> {
    let row = sqlx::query_as::<_, ReceiptSettingsRow>(
        r#"
        SELECT restaurant_id, print_layout, receipt_header, receipt_footer,
               show_address, show_phone, show_cnpj
        FROM receipt_settings
        WHERE restaurant_id = ?
        "#,
    )
    .bind(restaurant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ReceiptSettings::from).unwrap_or_default())
}

/// Everything an agent needs to print for a restaurant.
pub async fn get_print_config(pool: &SqlitePool, restaurant_id: &str) -> Result<PrintConfig> {
    let restaurant = get_restaurant(pool, restaurant_id).await?;
    let settings = get_receipt_settings(pool, restaurant_id).await?;
    let printers = list_active_printers(pool, restaurant_id).await?;
    let categories = list_categories(pool, restaurant_id).await?;

    Ok(PrintConfig {
        restaurant: restaurant.into(),
        settings,
        printers: printers.into_iter().map(PrinterConfig::from).collect(),
        categories: categories.into_iter().map(CategoryInfo::from).collect(),
    })
}

/// Record the spooler printers an agent found, registering unknown ones.
///
/// Every reported printer is upserted into `available_printers`. A printer
/// whose spooler name no configured printer uses yet is added to `printers`
/// as active, for every order type, at [`SYNCED_PRINTER_PAPER_WIDTH`].
/// Repeated names in one report count once.
pub async fn sync_printers(
    pool: &SqlitePool,
    restaurant_id: &str,
    client_id: &str,
    printers: &[SystemPrinter],
    now: DateTime<Utc>,
) -> Result<PrinterSyncResult> {
    validate_id("client_id", client_id)?;
    for printer in printers {
        validate_id("printer_name", &printer.name)?;
        validate_descriptor("display_name", printer.display_name.as_deref())?;
        validate_descriptor("driver_name", printer.description.as_deref())?;
    }
    ensure_restaurant(pool, restaurant_id).await?;

    let mut seen = HashSet::new();
    let printers: Vec<&SystemPrinter> = printers
        .iter()
        .filter(|p| seen.insert(p.name.trim()))
        .collect();

    let mut synced = 0u32;
    let mut registered = 0u32;
    let mut tx = pool.begin().await?;

    for printer in printers {
        let name = printer.name.trim();

        sqlx::query(
            r#"
            INSERT INTO available_printers (
                restaurant_id, printer_name, display_name, driver_name, is_default, client_id, last_seen_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(restaurant_id, printer_name) DO UPDATE SET
                display_name = excluded.display_name,
                driver_name = excluded.driver_name,
                is_default = excluded.is_default,
                client_id = excluded.client_id,
                last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(restaurant_id)
        .bind(name)
        .bind(printer.label())
        .bind(printer.description.as_deref())
        .bind(printer.is_default)
        .bind(client_id)
        .bind(now.timestamp_millis())
        .execute(&mut *tx)
        .await?;
        synced += 1;

        let inserted = sqlx::query(
            r#"
            INSERT INTO printers (id, restaurant_id, name, printer_name, paper_width, is_active)
            SELECT lower(hex(randomblob(16))), ?, ?, ?, ?, 1
            WHERE NOT EXISTS (
                SELECT 1 FROM printers WHERE restaurant_id = ? AND printer_name = ?
            )
            "#,
        )
        .bind(restaurant_id)
        .bind(printer.label())
        .bind(name)
        .bind(i64::from(SYNCED_PRINTER_PAPER_WIDTH))
        .bind(restaurant_id)
        .bind(name)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() > 0 {
            registered += 1;
            tracing::info!(
                restaurant_id = %restaurant_id,
                printer_name = %name,
                "Registered printer reported by agent"
            );
        }
    }

    tx.commit().await?;

    tracing::debug!(
        restaurant_id = %restaurant_id,
        client_id = %client_id,
        synced,
        registered,
        "Printers synced"
    );

    Ok(PrinterSyncResult {
        success: true,
        synced,
        registered,
    })
}

/// Printers last reported by the restaurant's agents, by name.
pub async fn list_available_printers(
    pool: &SqlitePool,
    restaurant_id: &str,
) -> Result<Vec<AvailablePrinter>> {
    let rows = sqlx::query_as::<_, AvailablePrinterRow>(
        r#"
        SELECT restaurant_id, printer_name, display_name, driver_name, is_default, client_id, last_seen_at
        FROM available_printers
        WHERE restaurant_id = ?
        ORDER BY printer_name ASC
        "#,
    )
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AvailablePrinter::from).collect())
}

/// Every printer of a restaurant, inactive ones included.
pub async fn list_printers(pool: &SqlitePool, restaurant_id: &str) -> Result<Vec<PrinterRow>> {
    let printers = sqlx::query_as::<_, PrinterRow>(
        r#"
        SELECT id, restaurant_id, name, printer_name, paper_width, linked_order_types, is_active
        FROM printers
        WHERE restaurant_id = ?
        ORDER BY name ASC, id ASC
        "#,
    )
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;

    Ok(printers)
}

//! Append-only print log. Rows are never updated or deleted.

use chrono::{DateTime, Utc};
use print_core::{NewPrintLog, PrintLogEntry};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::PrintLogRow;
use crate::restaurant::ensure_restaurant;
use crate::validation::{truncate_error_message, validate_descriptor, validate_id};

/// Default number of entries returned by [`list_print_logs`].
pub const DEFAULT_LOG_LIMIT: i64 = 50;

/// Record one print attempt.
pub async fn insert_print_log(
    pool: &SqlitePool,
    log: &NewPrintLog,
    now: DateTime<Utc>,
) -> Result<PrintLogEntry> {
    validate_id("restaurant_id", &log.restaurant_id)?;
    validate_id("order_id", &log.order_id)?;
    validate_descriptor("printer_name", log.printer_name.as_deref())?;

    ensure_restaurant(pool, &log.restaurant_id).await?;

    let error_message = log.error_message.as_deref().map(truncate_error_message);

    let row = sqlx::query_as::<_, PrintLogRow>(
        r#"
        INSERT INTO print_logs (
            restaurant_id, order_id, order_number, printer_name, items_count,
            status, error_message, event_type, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id, restaurant_id, order_id, order_number, printer_name, items_count,
                  status, error_message, event_type, created_at
        "#,
    )
    .bind(&log.restaurant_id)
    .bind(&log.order_id)
    .bind(&log.order_number)
    .bind(&log.printer_name)
    .bind(i64::from(log.items_count))
    .bind(log.status.as_str())
    .bind(error_message)
    .bind(log.event_type.as_str())
    .bind(now.timestamp_millis())
    .fetch_one(pool)
    .await?;

    tracing::debug!(
        restaurant_id = %log.restaurant_id,
        order_id = %log.order_id,
        status = %log.status,
        "Print attempt recorded"
    );

    row.try_into()
}

/// List the most recent entries of a restaurant, newest first.
pub async fn list_print_logs(
    pool: &SqlitePool,
    restaurant_id: &str,
    limit: i64,
) -> Result<Vec<PrintLogEntry>> {
    let rows = sqlx::query_as::<_, PrintLogRow>(
        r#"
        SELECT id, restaurant_id, order_id, order_number, printer_name, items_count,
               status, error_message, event_type, created_at
        FROM print_logs
        WHERE restaurant_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(restaurant_id)
    .bind(limit.max(1))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PrintLogEntry::try_from).collect()
}

/// List every attempt made for one order, oldest first.
pub async fn list_order_print_logs(pool: &SqlitePool, order_id: &str) -> Result<Vec<PrintLogEntry>> {
    let rows = sqlx::query_as::<_, PrintLogRow>(
        r#"
        SELECT id, restaurant_id, order_id, order_number, printer_name, items_count,
               status, error_message, event_type, created_at
        FROM print_logs
        WHERE order_id = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PrintLogEntry::try_from).collect()
}

//! Heartbeat store: the last known state of each print agent.

use chrono::{DateTime, Utc};
use print_core::HeartbeatPayload;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::PrinterHeartbeat;
use crate::restaurant::ensure_restaurant;
use crate::validation::{validate_descriptor, validate_id};

/// Client name stored when a heartbeat does not carry one.
pub const DEFAULT_CLIENT_NAME: &str = "Print Agent";
/// Client version stored when a heartbeat does not carry one.
pub const DEFAULT_CLIENT_VERSION: &str = "1.0.0";
/// Platform stored when a heartbeat does not carry one.
pub const DEFAULT_PLATFORM: &str = "unknown";

/// Record a heartbeat received at server time `now`.
///
/// Inserts the `(restaurant_id, client_id)` row on first contact and replaces
/// its mutable fields afterwards. `last_heartbeat_at` never moves backwards.
pub async fn upsert_heartbeat(
    pool: &SqlitePool,
    payload: &HeartbeatPayload,
    now: DateTime<Utc>,
) -> Result<PrinterHeartbeat> {
    let restaurant_id = payload.restaurant_id.trim();
    let client_id = payload.client_id.trim();

    validate_id("restaurant_id", restaurant_id)?;
    validate_id("client_id", client_id)?;
    validate_descriptor("client_name", payload.client_name.as_deref())?;
    validate_descriptor("client_version", payload.client_version.as_deref())?;
    validate_descriptor("platform", payload.platform.as_deref())?;

    ensure_restaurant(pool, restaurant_id).await?;

    let now_ms = now.timestamp_millis();

    let row = sqlx::query_as::<_, PrinterHeartbeat>(
        r#"
        INSERT INTO printer_heartbeats (
            restaurant_id, client_id, client_name, client_version, platform,
            printers_count, is_printing, pending_orders,
            last_heartbeat_at, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(restaurant_id, client_id) DO UPDATE SET
            client_name = excluded.client_name,
            client_version = excluded.client_version,
            platform = excluded.platform,
            printers_count = excluded.printers_count,
            is_printing = excluded.is_printing,
            pending_orders = excluded.pending_orders,
            last_heartbeat_at = MAX(printer_heartbeats.last_heartbeat_at, excluded.last_heartbeat_at),
            updated_at = excluded.updated_at
        RETURNING restaurant_id, client_id, client_name, client_version, platform,
                  printers_count, is_printing, pending_orders,
                  last_heartbeat_at, created_at, updated_at
        "#,
    )
    .bind(restaurant_id)
    .bind(client_id)
    .bind(payload.client_name.as_deref().unwrap_or(DEFAULT_CLIENT_NAME))
    .bind(payload.client_version.as_deref().unwrap_or(DEFAULT_CLIENT_VERSION))
    .bind(payload.platform.as_deref().unwrap_or(DEFAULT_PLATFORM))
    .bind(i64::from(payload.printers_count.unwrap_or(0)))
    .bind(payload.is_printing.unwrap_or(false))
    .bind(i64::from(payload.pending_orders.unwrap_or(0)))
    .bind(now_ms)
    .bind(now_ms)
    .bind(now_ms)
    .fetch_one(pool)
    .await?;

    tracing::debug!(
        restaurant_id = %restaurant_id,
        client_id = %client_id,
        "Heartbeat recorded"
    );

    Ok(row)
}

/// Get the heartbeat row of one agent.
pub async fn get_heartbeat(
    pool: &SqlitePool,
    restaurant_id: &str,
    client_id: &str,
) -> Result<PrinterHeartbeat> {
    sqlx::query_as::<_, PrinterHeartbeat>(
        r#"
        SELECT restaurant_id, client_id, client_name, client_version, platform,
               printers_count, is_printing, pending_orders,
               last_heartbeat_at, created_at, updated_at
        FROM printer_heartbeats
        WHERE restaurant_id = ? AND client_id = ?
        "#,
    )
    .bind(restaurant_id)
    .bind(client_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Heartbeat",
        id: format!("{}/{}", restaurant_id, client_id),
    })
}

/// List all agents of a restaurant, most recently seen first.
pub async fn list_heartbeats(
    pool: &SqlitePool,
    restaurant_id: &str,
) -> Result<Vec<PrinterHeartbeat>> {
    ensure_restaurant(pool, restaurant_id).await?;

    let heartbeats = sqlx::query_as::<_, PrinterHeartbeat>(
        r#"
        SELECT restaurant_id, client_id, client_name, client_version, platform,
               printers_count, is_printing, pending_orders,
               last_heartbeat_at, created_at, updated_at
        FROM printer_heartbeats
        WHERE restaurant_id = ?
        ORDER BY last_heartbeat_at DESC, client_id ASC
        "#,
    )
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;

    Ok(heartbeats)
}

/// The most recent heartbeat of any agent of a restaurant.
pub async fn latest_heartbeat(
    pool: &SqlitePool,
    restaurant_id: &str,
) -> Result<Option<PrinterHeartbeat>> {
    let heartbeat = sqlx::query_as::<_, PrinterHeartbeat>(
        r#"
        SELECT restaurant_id, client_id, client_name, client_version, platform,
               printers_count, is_printing, pending_orders,
               last_heartbeat_at, created_at, updated_at
        FROM printer_heartbeats
        WHERE restaurant_id = ?
        ORDER BY last_heartbeat_at DESC
        LIMIT 1
        "#,
    )
    .bind(restaurant_id)
    .fetch_optional(pool)
    .await?;

    Ok(heartbeat)
}

//! Per-restaurant auto-print switches.

use chrono::{DateTime, Utc};
use print_core::{PrintSettings, PrintSettingsPatch};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::PrintSettingsRow;
use crate::restaurant::ensure_restaurant;

/// Read the settings of a restaurant. A missing row reads as all defaults.
pub async fn get_print_settings(pool: &SqlitePool, restaurant_id: &str) -> Result<PrintSettings> {
    let row = sqlx::query_as::<_, PrintSettingsRow>(
        r#"
        SELECT restaurant_id, auto_print_counter, auto_print_table, auto_print_delivery, updated_at
        FROM print_settings
        WHERE restaurant_id = ?
        "#,
    )
    .bind(restaurant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(PrintSettings::from).unwrap_or_default())
}

/// Apply a partial update and return the resulting settings.
///
/// Fields absent from the patch keep their stored value, or the default when
/// no row exists yet. The update is a single upsert, so concurrent writers
/// never read a stale row.
pub async fn update_print_settings(
    pool: &SqlitePool,
    restaurant_id: &str,
    patch: &PrintSettingsPatch,
    now: DateTime<Utc>,
) -> Result<PrintSettings> {
    ensure_restaurant(pool, restaurant_id).await?;

    let defaults = PrintSettings::default();

    let row = sqlx::query_as::<_, PrintSettingsRow>(
        r#"
        INSERT INTO print_settings (
            restaurant_id, auto_print_counter, auto_print_table, auto_print_delivery, updated_at
        )
        VALUES (?, COALESCE(?, ?), COALESCE(?, ?), COALESCE(?, ?), ?)
        ON CONFLICT(restaurant_id) DO UPDATE SET
            auto_print_counter = COALESCE(?, print_settings.auto_print_counter),
            auto_print_table = COALESCE(?, print_settings.auto_print_table),
            auto_print_delivery = COALESCE(?, print_settings.auto_print_delivery),
            updated_at = excluded.updated_at
        RETURNING restaurant_id, auto_print_counter, auto_print_table, auto_print_delivery, updated_at
        "#,
    )
    .bind(restaurant_id)
    .bind(patch.auto_print_counter)
    .bind(defaults.auto_print_counter)
    .bind(patch.auto_print_table)
    .bind(defaults.auto_print_table)
    .bind(patch.auto_print_delivery)
    .bind(defaults.auto_print_delivery)
    .bind(now.timestamp_millis())
    .bind(patch.auto_print_counter)
    .bind(patch.auto_print_table)
    .bind(patch.auto_print_delivery)
    .fetch_one(pool)
    .await?;

    tracing::info!(restaurant_id = %restaurant_id, "Print settings updated");

    Ok(row.into())
}

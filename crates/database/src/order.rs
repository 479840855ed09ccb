//! Print queue operations on orders.
//!
//! An order waits for an agent while `print_status = 'pending'`. Status
//! updates report the previous value so callers can publish the
//! `printed` transition.

use chrono::{DateTime, Utc};
use print_core::{OrderPrintStatus, PrintEventType, PrintOrder};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{OrderItemRow, OrderRow};
use crate::validation::validate_id;

/// A print status update applied to one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintStatusChange {
    pub restaurant_id: String,
    pub order_id: String,
    pub order_number: Option<i64>,
    pub order_type: Option<String>,
    pub old_status: String,
    pub new_status: String,
}

impl PrintStatusChange {
    fn from_row(row: &OrderRow, new_status: OrderPrintStatus) -> Self {
        Self {
            restaurant_id: row.restaurant_id.clone(),
            order_id: row.id.clone(),
            order_number: row.order_number,
            order_type: row.order_type.clone(),
            old_status: row.print_status.clone(),
            new_status: new_status.as_str().to_string(),
        }
    }
}

/// Insert an order together with its items.
pub async fn create_order(pool: &SqlitePool, order: &OrderRow, items: &[OrderItemRow]) -> Result<()> {
    validate_id("order_id", &order.id)?;
    order.print_status.parse::<OrderPrintStatus>()?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, restaurant_id, order_number, order_type, customer_name, total, notes,
            delivery_address, delivery_phone, delivery_fee, table_number, waiter_name,
            print_status, print_event, printed_at, print_count, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&order.id)
    .bind(&order.restaurant_id)
    .bind(order.order_number)
    .bind(&order.order_type)
    .bind(&order.customer_name)
    .bind(order.total)
    .bind(&order.notes)
    .bind(&order.delivery_address)
    .bind(&order.delivery_phone)
    .bind(order.delivery_fee)
    .bind(order.table_number)
    .bind(&order.waiter_name)
    .bind(&order.print_status)
    .bind(&order.print_event)
    .bind(order.printed_at)
    .bind(order.print_count)
    .bind(order.created_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Order",
                    id: order.id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_name, product_size, quantity, notes,
                product_price, category_id, position
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&order.id)
        .bind(&item.product_name)
        .bind(&item.product_size)
        .bind(item.quantity)
        .bind(&item.notes)
        .bind(item.product_price)
        .bind(&item.category_id)
        .bind(item.position)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Get an order of a restaurant by ID.
pub async fn get_order(pool: &SqlitePool, restaurant_id: &str, id: &str) -> Result<OrderRow> {
    sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT id, restaurant_id, order_number, order_type, customer_name, total, notes,
               delivery_address, delivery_phone, delivery_fee, table_number, waiter_name,
               print_status, print_event, printed_at, print_count, created_at
        FROM orders
        WHERE restaurant_id = ? AND id = ?
        "#,
    )
    .bind(restaurant_id)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Order",
        id: id.to_string(),
    })
}

/// Get the items of an order in display order.
pub async fn get_order_items(pool: &SqlitePool, order_id: &str) -> Result<Vec<OrderItemRow>> {
    let items = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT id, order_id, product_name, product_size, quantity, notes,
               product_price, category_id, position
        FROM order_items
        WHERE order_id = ?
        ORDER BY position ASC, id ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

/// List orders waiting for an agent, oldest first, with their items.
pub async fn list_pending_orders(pool: &SqlitePool, restaurant_id: &str) -> Result<Vec<PrintOrder>> {
    let rows = sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT id, restaurant_id, order_number, order_type, customer_name, total, notes,
               delivery_address, delivery_phone, delivery_fee, table_number, waiter_name,
               print_status, print_event, printed_at, print_count, created_at
        FROM orders
        WHERE restaurant_id = ? AND print_status = 'pending'
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = get_order_items(pool, &row.id).await?;
        orders.push(row.into_print_order(items)?);
    }

    Ok(orders)
}

/// Queue an order for printing.
///
/// The order becomes `pending` regardless of its current status, and the
/// event type is kept so the agent can record what triggered the print.
pub async fn queue_order(
    pool: &SqlitePool,
    restaurant_id: &str,
    order_id: &str,
    event_type: PrintEventType,
) -> Result<PrintStatusChange> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT id, restaurant_id, order_number, order_type, customer_name, total, notes,
               delivery_address, delivery_phone, delivery_fee, table_number, waiter_name,
               print_status, print_event, printed_at, print_count, created_at
        FROM orders
        WHERE restaurant_id = ? AND id = ?
        "#,
    )
    .bind(restaurant_id)
    .bind(order_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Order",
        id: order_id.to_string(),
    })?;

    sqlx::query(
        r#"
        UPDATE orders
        SET print_status = 'pending', print_event = ?
        WHERE id = ?
        "#,
    )
    .bind(event_type.as_str())
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        restaurant_id = %restaurant_id,
        order_id = %order_id,
        event_type = %event_type,
        "Order queued for printing"
    );

    Ok(PrintStatusChange::from_row(&row, OrderPrintStatus::Pending))
}

/// Mark orders of a restaurant as printed.
///
/// Unknown IDs, IDs of other restaurants and orders already printed are
/// skipped, so a repeated acknowledgement changes nothing. Returns one change
/// per order that moved into `printed`, in the order the IDs were given.
pub async fn mark_printed(
    pool: &SqlitePool,
    restaurant_id: &str,
    order_ids: &[String],
    now: DateTime<Utc>,
) -> Result<Vec<PrintStatusChange>> {
    let mut tx = pool.begin().await?;
    let mut changes = Vec::with_capacity(order_ids.len());

    for order_id in order_ids {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, restaurant_id, order_number, order_type, customer_name, total, notes,
                   delivery_address, delivery_phone, delivery_fee, table_number, waiter_name,
                   print_status, print_event, printed_at, print_count, created_at
            FROM orders
            WHERE restaurant_id = ? AND id = ?
            "#,
        )
        .bind(restaurant_id)
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tracing::warn!(restaurant_id = %restaurant_id, order_id = %order_id, "Order to mark printed not found");
            continue;
        };

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET print_status = 'printed', printed_at = ?, print_count = print_count + 1
            WHERE id = ? AND print_status != 'printed'
            "#,
        )
        .bind(now.timestamp_millis())
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tracing::debug!(restaurant_id = %restaurant_id, order_id = %order_id, "Order already printed");
            continue;
        }

        changes.push(PrintStatusChange::from_row(&row, OrderPrintStatus::Printed));
    }

    tx.commit().await?;
    Ok(changes)
}

/// Take every pending order of a restaurant out of the queue.
///
/// Returns the number of orders cleared.
pub async fn clear_pending(pool: &SqlitePool, restaurant_id: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET print_status = 'none'
        WHERE restaurant_id = ? AND print_status = 'pending'
        "#,
    )
    .bind(restaurant_id)
    .execute(pool)
    .await?;

    let cleared = result.rows_affected();
    if cleared > 0 {
        tracing::info!(restaurant_id = %restaurant_id, cleared, "Pending print queue cleared");
    }

    Ok(cleared)
}

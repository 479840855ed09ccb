//! Print intents issued by the POS user interface.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use database::{order, print_settings};
use print_core::{OrderType, PrintEventType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{required, Result};
use crate::routes::print_orders::publish_status_change;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PrintIntent {
    #[serde(default)]
    pub restaurant_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub event_type: PrintEventType,
}

#[derive(Debug, Serialize)]
pub struct PrintIntentResponse {
    /// Whether the order was put in the print queue.
    pub dispatched: bool,
}

/// Queue an order for printing.
///
/// Automatic prints follow the restaurant's print settings; explicit prints
/// and reprints are always queued.
pub async fn create(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PrintIntent>, JsonRejection>,
) -> Result<Json<PrintIntentResponse>> {
    let Json(intent) = payload?;
    let restaurant_id = required(intent.restaurant_id.as_deref(), "restaurant_id")?;
    let order_id = required(intent.order_id.as_deref(), "order_id")?;
    let pool = state.db.pool();

    if intent.event_type == PrintEventType::AutoPrint {
        let order = order::get_order(pool, restaurant_id, order_id).await?;
        let order_type = OrderType::from_optional(order.order_type.as_deref());
        let settings = print_settings::get_print_settings(pool, restaurant_id).await?;

        if !settings.should_auto_print(&order_type) {
            info!(
                restaurant_id = %restaurant_id,
                order_id = %order_id,
                order_type = %order_type,
                "Auto-print disabled for order type, skipping"
            );
            return Ok(Json(PrintIntentResponse { dispatched: false }));
        }
    }

    let _guard = state.lock_restaurant(restaurant_id).await;
    let change = order::queue_order(pool, restaurant_id, order_id, intent.event_type).await?;
    publish_status_change(&state.relay, change);

    Ok(Json(PrintIntentResponse { dispatched: true }))
}

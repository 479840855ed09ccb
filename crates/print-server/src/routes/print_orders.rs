//! Print queue endpoint used by agents.
//!
//! One path, selected by `?action=`:
//!
//! | Method | Action | Body |
//! |--------|--------|------|
//! | GET | `get` (default) | none |
//! | POST | `mark-printed` | `{"order_ids": [...]}` |
//! | POST | `reprint` | `{"order_id": "..."}` |
//! | POST | `clear-pending` | none |

use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use database::{order, PrintStatusChange};
use print_core::{PrintEventType, PrintOrder};
use relay::{Change, Relay};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{required, Result, ServerError};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    Get,
    MarkPrinted,
    Reprint,
    ClearPending,
}

impl FromStr for QueueAction {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "get" => Ok(Self::Get),
            "mark-printed" => Ok(Self::MarkPrinted),
            "reprint" => Ok(Self::Reprint),
            "clear-pending" => Ok(Self::ClearPending),
            _ => Err(invalid_action()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PrintOrdersQuery {
    pub restaurant_id: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkPrintedRequest {
    #[serde(default)]
    pub order_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReprintRequest {
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingOrdersResponse {
    pub orders: Vec<PrintOrder>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MarkPrintedResponse {
    pub success: bool,
    pub marked: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearPendingResponse {
    pub success: bool,
    pub cleared: u64,
}

fn invalid_action() -> ServerError {
    ServerError::BadRequest("Invalid action".to_string())
}

/// Publish an order status change on the relay.
pub(crate) fn publish_status_change(relay: &Relay, change: PrintStatusChange) {
    relay.publish(Change::Order {
        restaurant_id: change.restaurant_id,
        order_id: change.order_id,
        order_number: change.order_number,
        order_type: change.order_type,
        old_status: Some(change.old_status),
        new_status: Some(change.new_status),
    });
}

/// Dispatch a print queue request.
pub async fn handle(
    method: Method,
    State(state): State<AppState>,
    query: std::result::Result<Query<PrintOrdersQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response> {
    let Query(query) = query?;
    let restaurant_id = required(query.restaurant_id.as_deref(), "restaurant_id")?;
    let action: QueueAction = query.action.as_deref().unwrap_or("get").parse()?;

    info!(restaurant_id = %restaurant_id, action = ?action, "Print queue request");

    let pool = state.db.pool();

    match (method, action) {
        (Method::GET, QueueAction::Get) => {
            let orders = order::list_pending_orders(pool, restaurant_id).await?;
            let count = orders.len();
            Ok(Json(PendingOrdersResponse { orders, count }).into_response())
        }
        (Method::POST, QueueAction::MarkPrinted) => {
            let request: MarkPrintedRequest = serde_json::from_slice(&body).unwrap_or_default();
            if request.order_ids.is_empty() {
                return Err(ServerError::BadRequest("order_ids array is required".to_string()));
            }

            let _guard = state.lock_restaurant(restaurant_id).await;
            let changes = order::mark_printed(pool, restaurant_id, &request.order_ids, Utc::now()).await?;
            let marked = changes.len();
            for change in changes {
                publish_status_change(&state.relay, change);
            }

            info!(restaurant_id = %restaurant_id, marked, "Orders marked as printed");
            Ok(Json(MarkPrintedResponse { success: true, marked }).into_response())
        }
        (Method::POST, QueueAction::Reprint) => {
            let request: ReprintRequest = serde_json::from_slice(&body).unwrap_or_default();
            let order_id = required(request.order_id.as_deref(), "order_id")?;

            let _guard = state.lock_restaurant(restaurant_id).await;
            let change = order::queue_order(pool, restaurant_id, order_id, PrintEventType::Reprint).await?;
            publish_status_change(&state.relay, change);

            Ok(Json(serde_json::json!({ "success": true })).into_response())
        }
        (Method::POST, QueueAction::ClearPending) => {
            let cleared = order::clear_pending(pool, restaurant_id).await?;
            Ok(Json(ClearPendingResponse {
                success: true,
                cleared,
            })
            .into_response())
        }
        _ => Err(invalid_action()),
    }
}

//! Print log recording and listing.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use database::print_log::{self, DEFAULT_LOG_LIMIT};
use print_core::{NewPrintLog, PrintLogEntry};
use serde::{Deserialize, Serialize};

use crate::error::{required, Result, ServerError};
use crate::state::AppState;

/// Upper bound on `limit` for listing.
const MAX_LOG_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListLogsQuery {
    pub restaurant_id: Option<String>,
    pub order_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PrintLogsResponse {
    pub logs: Vec<PrintLogEntry>,
}

/// Append one print attempt.
pub async fn record(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewPrintLog>, JsonRejection>,
) -> Result<Json<PrintLogEntry>> {
    let Json(log) = payload?;
    log.validate()?;

    let entry = print_log::insert_print_log(state.db.pool(), &log, Utc::now()).await?;

    if entry.status == print_core::PrintOutcome::Error {
        tracing::warn!(
            restaurant_id = %entry.restaurant_id,
            order_id = %entry.order_id,
            error = ?entry.error_message,
            "Agent reported a failed print"
        );
    }

    Ok(Json(entry))
}

/// List recent attempts of a restaurant, or every attempt of one order.
pub async fn list(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListLogsQuery>, QueryRejection>,
) -> Result<Json<PrintLogsResponse>> {
    let Query(query) = query?;
    let restaurant_id = required(query.restaurant_id.as_deref(), "restaurant_id")?;

    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    if !(1..=MAX_LOG_LIMIT).contains(&limit) {
        return Err(ServerError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LOG_LIMIT
        )));
    }

    let logs = match query.order_id.as_deref() {
        Some(order_id) => print_log::list_order_print_logs(state.db.pool(), order_id)
            .await?
            .into_iter()
            .filter(|entry| entry.restaurant_id == restaurant_id)
            .collect(),
        None => print_log::list_print_logs(state.db.pool(), restaurant_id, limit).await?,
    };

    Ok(Json(PrintLogsResponse { logs }))
}

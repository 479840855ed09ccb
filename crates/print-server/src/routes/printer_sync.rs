//! Spooler printers reported by agents.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use database::print_config;
use print_core::{AvailablePrinter, PrinterConfig, PrinterSyncRequest, PrinterSyncResult};
use serde::Serialize;

use crate::error::{required, Result};
use crate::routes::heartbeat::RestaurantQuery;
use crate::state::AppState;

/// Configured and reported printers of a restaurant.
#[derive(Debug, Serialize)]
pub struct PrinterListResponse {
    pub printers: Vec<PrinterConfig>,
    pub available: Vec<AvailablePrinter>,
}

/// Record the printers an agent found and register the unknown ones.
pub async fn sync(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PrinterSyncRequest>, JsonRejection>,
) -> Result<Json<PrinterSyncResult>> {
    let Json(request) = payload?;
    request.validate()?;

    let restaurant_id = request.restaurant_id.trim();
    let result = print_config::sync_printers(
        state.db.pool(),
        restaurant_id,
        request.client_id.trim(),
        &request.printers,
        Utc::now(),
    )
    .await?;

    tracing::info!(
        restaurant_id = %restaurant_id,
        client_id = %request.client_id,
        synced = result.synced,
        registered = result.registered,
        "Printer sync"
    );

    Ok(Json(result))
}

/// List every configured printer and the printers agents last reported.
pub async fn list(
    State(state): State<AppState>,
    query: std::result::Result<Query<RestaurantQuery>, QueryRejection>,
) -> Result<Json<PrinterListResponse>> {
    let Query(query) = query?;
    let restaurant_id = required(query.restaurant_id.as_deref(), "restaurant_id")?;

    database::restaurant::ensure_restaurant(state.db.pool(), restaurant_id).await?;
    let printers = print_config::list_printers(state.db.pool(), restaurant_id).await?;
    let available = print_config::list_available_printers(state.db.pool(), restaurant_id).await?;

    Ok(Json(PrinterListResponse {
        printers: printers.into_iter().map(PrinterConfig::from).collect(),
        available,
    }))
}

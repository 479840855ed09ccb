//! Print configuration for agents.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use database::print_config;
use print_core::PrintConfig;

use crate::error::{required, Result};
use crate::routes::heartbeat::RestaurantQuery;
use crate::state::AppState;

/// Restaurant identity, receipt settings, active printers and categories.
pub async fn get_config(
    State(state): State<AppState>,
    query: std::result::Result<Query<RestaurantQuery>, QueryRejection>,
) -> Result<Json<PrintConfig>> {
    let Query(query) = query?;
    let restaurant_id = required(query.restaurant_id.as_deref(), "restaurant_id")?;

    let config = print_config::get_print_config(state.db.pool(), restaurant_id).await?;

    tracing::debug!(
        restaurant_id = %restaurant_id,
        printers = config.printers.len(),
        "Serving print config"
    );

    Ok(Json(config))
}

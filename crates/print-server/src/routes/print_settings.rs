//! Auto-print settings.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use database::print_settings;
use print_core::{PrintSettings, PrintSettingsPatch};
use serde::Deserialize;

use crate::error::{required, Result};
use crate::routes::heartbeat::RestaurantQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub restaurant_id: Option<String>,
    #[serde(flatten)]
    pub patch: PrintSettingsPatch,
}

/// Read the settings; a restaurant without a row gets the defaults.
pub async fn get_settings(
    State(state): State<AppState>,
    query: std::result::Result<Query<RestaurantQuery>, QueryRejection>,
) -> Result<Json<PrintSettings>> {
    let Query(query) = query?;
    let restaurant_id = required(query.restaurant_id.as_deref(), "restaurant_id")?;

    let settings = print_settings::get_print_settings(state.db.pool(), restaurant_id).await?;
    Ok(Json(settings))
}

/// Apply a partial update.
pub async fn update_settings(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateSettingsRequest>, JsonRejection>,
) -> Result<Json<PrintSettings>> {
    let Json(request) = payload?;
    let restaurant_id = required(request.restaurant_id.as_deref(), "restaurant_id")?;

    let settings =
        print_settings::update_print_settings(state.db.pool(), restaurant_id, &request.patch, Utc::now())
            .await?;
    Ok(Json(settings))
}

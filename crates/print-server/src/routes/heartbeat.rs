//! Heartbeat ingestion and agent status.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use database::heartbeat;
use print_core::{evaluate, evaluate_all, AgentStatus, ChangeOp, ConnectionStatus, HeartbeatPayload, HeartbeatRecord};
use relay::Change;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{required, Result, ServerError};
use crate::state::AppState;

/// Query selecting a restaurant.
#[derive(Debug, Deserialize)]
pub struct RestaurantQuery {
    pub restaurant_id: Option<String>,
}

/// Response to an accepted heartbeat.
#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    pub heartbeat: HeartbeatRecord,
}

/// Heartbeats of a restaurant with their evaluated status.
#[derive(Debug, Serialize)]
pub struct HeartbeatListResponse {
    /// Status of the most recently seen agent.
    pub status: ConnectionStatus,
    pub agents: Vec<AgentStatus>,
    pub heartbeats: Vec<HeartbeatRecord>,
}

/// Record a heartbeat from a print agent.
pub async fn ingest(
    State(state): State<AppState>,
    payload: std::result::Result<Json<HeartbeatPayload>, JsonRejection>,
) -> Result<Json<HeartbeatResponse>> {
    let Json(payload) = payload?;

    if payload.validate().is_err() {
        return Err(ServerError::BadRequest(
            "restaurant_id and client_id are required".to_string(),
        ));
    }

    let _guard = state.lock_restaurant(payload.restaurant_id.trim()).await;
    let row = heartbeat::upsert_heartbeat(state.db.pool(), &payload, Utc::now()).await?;

    let op = if row.created_at == row.updated_at {
        info!(
            restaurant_id = %row.restaurant_id,
            client_id = %row.client_id,
            client_name = ?row.client_name,
            "New print agent registered"
        );
        ChangeOp::Insert
    } else {
        ChangeOp::Update
    };

    let record = HeartbeatRecord::from(row);
    state.relay.publish(Change::Heartbeat {
        op,
        heartbeat: record.clone(),
    });

    Ok(Json(HeartbeatResponse {
        success: true,
        heartbeat: record,
    }))
}

/// List the agents of a restaurant, most recently seen first.
pub async fn list(
    State(state): State<AppState>,
    query: std::result::Result<Query<RestaurantQuery>, QueryRejection>,
) -> Result<Json<HeartbeatListResponse>> {
    let Query(query) = query?;
    let restaurant_id = required(query.restaurant_id.as_deref(), "restaurant_id")?;

    let heartbeats: Vec<HeartbeatRecord> = heartbeat::list_heartbeats(state.db.pool(), restaurant_id)
        .await?
        .into_iter()
        .map(HeartbeatRecord::from)
        .collect();

    let now = Utc::now();

    Ok(Json(HeartbeatListResponse {
        status: evaluate(heartbeats.first(), now),
        agents: evaluate_all(&heartbeats, now),
        heartbeats,
    }))
}

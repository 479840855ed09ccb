//! Server-sent change feed of a restaurant.

use std::convert::Infallible;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::{Stream, StreamExt};

use crate::error::{required, Result, ServerError};
use crate::routes::heartbeat::RestaurantQuery;
use crate::state::AppState;

/// Stream relay events as SSE. The subscription stops when the client disconnects.
pub async fn stream(
    State(state): State<AppState>,
    query: std::result::Result<Query<RestaurantQuery>, QueryRejection>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let Query(query) = query?;
    let restaurant_id = required(query.restaurant_id.as_deref(), "restaurant_id")?;

    let subscription = state
        .relay
        .subscribe(restaurant_id)
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    tracing::info!(restaurant_id = %restaurant_id, "Change feed client connected");

    let events = subscription.into_stream().filter_map(|event| {
        match Event::default().event(event.name()).json_data(&event) {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to encode relay event");
                None
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

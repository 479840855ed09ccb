//! Route handlers for the print server.

pub mod events;
pub mod health;
pub mod heartbeat;
pub mod print_config;
pub mod print_intents;
pub mod print_logs;
pub mod print_orders;
pub mod print_settings;
pub mod printer_sync;

use axum::routing::{get, post};
use axum::Router;

use crate::error::method_not_allowed;
use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Agent endpoints
        .route(
            "/api/printer-heartbeat",
            post(heartbeat::ingest).fallback(method_not_allowed),
        )
        .route("/api/printer-config", get(print_config::get_config))
        .route(
            "/api/printer-sync",
            get(printer_sync::list).post(printer_sync::sync),
        )
        .route(
            "/api/print-orders",
            get(print_orders::handle).post(print_orders::handle),
        )
        .route(
            "/api/print-logs",
            get(print_logs::list).post(print_logs::record),
        )
        // Dashboard endpoints
        .route("/api/heartbeats", get(heartbeat::list))
        .route("/api/print-intents", post(print_intents::create))
        .route(
            "/api/print-settings",
            get(print_settings::get_settings).put(print_settings::update_settings),
        )
        .route("/api/events", get(events::stream))
}

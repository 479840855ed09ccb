//! HTTP service for the print dispatch bridge.
//!
//! Agents send heartbeats, fetch their print configuration, poll the print
//! queue and record print attempts. Dashboards read agent status and print
//! settings, issue print intents and follow a per-restaurant change feed.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::{Config, ConfigError};
pub use error::ServerError;
pub use state::AppState;

/// Build the application with state and request tracing.
pub fn app(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

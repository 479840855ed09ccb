//! Application state shared across handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use database::Database;
use relay::Relay;
use tokio::sync::OwnedMutexGuard;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Per-restaurant change feed.
    pub relay: Relay,
    /// Held from a write until its change is published, so subscribers see
    /// a restaurant's changes in commit order.
    write_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl AppState {
    /// Create new application state.
    pub fn new(db: Database, relay: Relay) -> Self {
        Self {
            db,
            relay,
            write_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serialize a write and its publish with the other writes of a restaurant.
    pub async fn lock_restaurant(&self, restaurant_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .write_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks
                .entry(restaurant_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

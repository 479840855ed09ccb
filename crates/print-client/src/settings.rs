//! Read-through cache of print settings.

use std::collections::HashMap;
use std::sync::Arc;

use print_core::{OrderType, PrintSettings, PrintSettingsPatch};
use tokio::sync::RwLock;
use tracing::warn;

use crate::client::CloudClient;
use crate::error::Result;

/// Resolves auto-print settings per restaurant.
///
/// Reads fall back to the defaults (everything enabled) when the service
/// cannot be reached, and such fallbacks are not cached.
#[derive(Clone)]
pub struct SettingsResolver {
    client: CloudClient,
    cache: Arc<RwLock<HashMap<String, PrintSettings>>>,
}

impl SettingsResolver {
    pub fn new(client: CloudClient) -> Self {
        Self {
            client,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn cached(&self, restaurant_id: &str) -> Option<PrintSettings> {
        self.cache.read().await.get(restaurant_id).cloned()
    }

    async fn store(&self, restaurant_id: &str, settings: PrintSettings) {
        self.cache
            .write()
            .await
            .insert(restaurant_id.to_string(), settings);
    }

    /// Settings of a restaurant, from cache when available.
    pub async fn get(&self, restaurant_id: &str) -> PrintSettings {
        if let Some(settings) = self.cached(restaurant_id).await {
            return settings;
        }

        match self.refetch(restaurant_id).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(restaurant_id = %restaurant_id, error = %e, "Failed to load print settings, using defaults");
                PrintSettings::default()
            }
        }
    }

    /// Fetch from the service and refresh the cache.
    pub async fn refetch(&self, restaurant_id: &str) -> Result<PrintSettings> {
        let settings = self.client.get_print_settings(restaurant_id).await?;
        self.store(restaurant_id, settings.clone()).await;
        Ok(settings)
    }

    /// Apply a partial update and cache the stored result.
    pub async fn update(&self, restaurant_id: &str, patch: &PrintSettingsPatch) -> Result<PrintSettings> {
        let settings = self.client.update_print_settings(restaurant_id, patch).await?;
        self.store(restaurant_id, settings.clone()).await;
        Ok(settings)
    }

    /// Whether orders of this type are printed without user action.
    pub async fn should_auto_print(&self, restaurant_id: &str, order_type: &OrderType) -> bool {
        self.get(restaurant_id).await.should_auto_print(order_type)
    }

    pub async fn invalidate(&self, restaurant_id: &str) {
        self.cache.write().await.remove(restaurant_id);
    }
}

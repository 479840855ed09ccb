//! SQLite persistence layer for print dispatch.
//!
//! This crate stores restaurants, agent heartbeats, print logs, print
//! settings, the order print queue and printer configuration using SQLx with
//! SQLite. Timestamps are passed in by the caller so that server time is the
//! single source of truth.
//!
//! # Example
//!
//! ```no_run
//! use database::{heartbeat, models::Restaurant, restaurant, Database};
//! use print_core::HeartbeatPayload;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:print.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let r = Restaurant {
//!         id: "r1".to_string(),
//!         name: "Cantina".to_string(),
//!         phone: None,
//!         address: None,
//!         cnpj: None,
//!         logo_url: None,
//!     };
//!     restaurant::create_restaurant(db.pool(), &r).await?;
//!
//!     let payload = HeartbeatPayload::new("r1", "agent-1");
//!     heartbeat::upsert_heartbeat(db.pool(), &payload, chrono::Utc::now()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod heartbeat;
pub mod models;
pub mod order;
pub mod print_config;
pub mod print_log;
pub mod print_settings;
pub mod restaurant;
pub mod validation;

pub use error::{DatabaseError, Result};
pub use models::{
    AvailablePrinterRow, CategoryRow, OrderItemRow, OrderRow, PrintLogRow, PrintSettingsRow, PrinterHeartbeat,
    PrinterRow, ReceiptSettingsRow, Restaurant,
};
pub use order::PrintStatusChange;
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 10;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/print.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

/// Print server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Events buffered per restaurant on the change feed.
    pub relay_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `PRINT_SERVER_ADDR` | Server bind address | `127.0.0.1:8790` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:print.db?mode=rwc` |
    /// | `RELAY_CAPACITY` | Change feed buffer per restaurant | `256` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("PRINT_SERVER_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8790".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("SQLITE_PATH")
            .unwrap_or_else(|_| "sqlite:print.db?mode=rwc".to_string());

        let relay_capacity = match env::var("RELAY_CAPACITY") {
            Ok(value) => value
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or(ConfigError::InvalidRelayCapacity(value))?,
            Err(_) => relay::DEFAULT_CAPACITY,
        };

        Ok(Self {
            addr,
            database_url,
            relay_capacity,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PRINT_SERVER_ADDR format")]
    InvalidAddr,

    #[error("RELAY_CAPACITY must be a positive integer, got {0:?}")]
    InvalidRelayCapacity(String),
}

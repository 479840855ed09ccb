//! Error types for the print agent.

use std::path::PathBuf;

use print_client::ClientError;
use thiserror::Error;

/// Failures talking to printer hardware or the OS spooler.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Printers could not be listed.
    #[error("printer enumeration failed: {0}")]
    Enumeration(String),

    /// No device matches the requested identity.
    #[error("printer not found: {0}")]
    NotFound(String),

    /// The device exists but could not be opened or reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The device rejected or did not accept the job.
    #[error("print failed: {0}")]
    Print(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the agent and its local bridge.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Error from the print service client.
    #[error("service error: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Config file could not be read or written.
    #[error("config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the agent.
    #[error("invalid config file {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required setting is missing.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// No printer could be chosen for a job.
    #[error("no printer configured")]
    NoPrinter,
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

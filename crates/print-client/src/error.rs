//! Error types for print-client.

use thiserror::Error;

/// Errors that can occur when talking to the print service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with an error status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// SSE stream error.
    #[error("SSE error: {0}")]
    Sse(String),
}

impl ClientError {
    /// Whether retrying later may succeed.
    ///
    /// Connection failures, timeouts and 5xx answers are transient; 4xx
    /// answers and malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.is_request()
                    || e.status().map_or(false, |s| s.is_server_error())
            }
            ClientError::Status { status, .. } => *status >= 500,
            ClientError::Sse(_) => true,
            ClientError::Json(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { status: 404, .. })
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let server = ClientError::Status {
            status: 503,
            message: "unavailable".to_string(),
        };
        let missing = ClientError::Status {
            status: 404,
            message: "Restaurant not found".to_string(),
        };
        assert!(server.is_transient());
        assert!(!missing.is_transient());
        assert!(missing.is_not_found());
        assert!(ClientError::Sse("closed".to_string()).is_transient());
    }
}

//! Best-effort print log recording.

use print_core::{NewPrintLog, PrintLogEntry};
use tracing::{debug, warn};

use crate::client::CloudClient;

/// Records print attempts without ever failing the caller.
#[derive(Debug, Clone)]
pub struct PrintLogRecorder {
    client: CloudClient,
}

impl PrintLogRecorder {
    pub fn new(client: CloudClient) -> Self {
        Self { client }
    }

    /// Record an attempt. Failures are logged and yield `None`.
    pub async fn record(&self, log: &NewPrintLog) -> Option<PrintLogEntry> {
        match self.client.record_print_log(log).await {
            Ok(entry) => {
                debug!(order_id = %entry.order_id, status = %entry.status, "Print log recorded");
                Some(entry)
            }
            Err(e) => {
                warn!(
                    restaurant_id = %log.restaurant_id,
                    order_id = %log.order_id,
                    error = %e,
                    "Failed to record print log"
                );
                None
            }
        }
    }
}

//! Change feed subscription over Server-Sent Events.

use std::time::Duration;

use futures::StreamExt;
use print_core::RelayEvent;
use reqwest_eventsource::{retry, Event, EventSource, RequestBuilderExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::CloudClient;
use crate::error::{ClientError, Result};

/// Configuration for automatic reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of retries (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.min(64) as i32);
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(delay_ms.min(max_ms) as u64)
    }

    /// Check if we should retry after the given number of attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts < max)
    }
}

struct RunningFeed {
    restaurant_id: String,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Handle on a change feed subscription.
///
/// Events of the current restaurant are delivered to the receiver returned by
/// [`EventFeed::new`]. Switching restaurant with [`EventFeed::start`] keeps
/// the same receiver. The feed stops on [`EventFeed::stop`] or when dropped.
pub struct EventFeed {
    client: CloudClient,
    reconnect: ReconnectConfig,
    tx: mpsc::Sender<RelayEvent>,
    running: Option<RunningFeed>,
}

impl EventFeed {
    /// Create a stopped feed and the receiver its events go to.
    pub fn new(client: CloudClient, reconnect: ReconnectConfig) -> (Self, mpsc::Receiver<RelayEvent>) {
        let (tx, rx) = mpsc::channel(100);
        let feed = Self {
            client,
            reconnect,
            tx,
            running: None,
        };
        (feed, rx)
    }

    /// Subscribe to a restaurant, replacing any current subscription.
    pub fn start(&mut self, restaurant_id: &str) {
        if self.restaurant_id() == Some(restaurant_id) {
            return;
        }
        self.stop();

        let url = self.client.config().events_url(restaurant_id);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_feed(url, self.reconnect.clone(), self.tx.clone(), shutdown_rx));

        info!(restaurant_id = %restaurant_id, "Change feed started");

        self.running = Some(RunningFeed {
            restaurant_id: restaurant_id.to_string(),
            shutdown,
            handle,
        });
    }

    /// Stop the subscription. Calling it again has no effect.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
            running.handle.abort();
            info!(restaurant_id = %running.restaurant_id, "Change feed stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Restaurant currently subscribed to.
    pub fn restaurant_id(&self) -> Option<&str> {
        self.running.as_ref().map(|r| r.restaurant_id.as_str())
    }
}

impl Drop for EventFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open(url: &str) -> Result<EventSource> {
    // SSE connections are long-lived and must not use the request timeout.
    let mut source = reqwest::Client::new()
        .get(url)
        .eventsource()
        .map_err(|e| ClientError::Sse(e.to_string()))?;
    source.set_retry_policy(Box::new(retry::Never));
    Ok(source)
}

/// Why a connection ended.
enum Disconnect {
    Shutdown,
    ReceiverGone,
    Lost(String),
}

async fn run_feed(
    url: String,
    reconnect: ReconnectConfig,
    tx: mpsc::Sender<RelayEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut attempts = 0u32;

    loop {
        let outcome = match open(&url) {
            Ok(mut source) => {
                let outcome = read_events(&mut source, &tx, &mut shutdown_rx, &mut attempts).await;
                source.close();
                outcome
            }
            Err(e) => Disconnect::Lost(e.to_string()),
        };

        let reason = match outcome {
            Disconnect::Shutdown | Disconnect::ReceiverGone => return,
            Disconnect::Lost(reason) => reason,
        };

        if !reconnect.should_retry(attempts) {
            error!(url = %url, attempts, "Change feed giving up: {}", reason);
            return;
        }

        let delay = reconnect.delay_for_attempt(attempts);
        attempts += 1;
        warn!(url = %url, attempt = attempts, ?delay, "Change feed lost ({}), reconnecting", reason);

        tokio::select! {
            biased;
            _ = &mut shutdown_rx => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn read_events(
    source: &mut EventSource,
    tx: &mpsc::Sender<RelayEvent>,
    shutdown_rx: &mut oneshot::Receiver<()>,
    attempts: &mut u32,
) -> Disconnect {
    loop {
        let next = tokio::select! {
            biased;
            _ = &mut *shutdown_rx => return Disconnect::Shutdown,
            next = source.next() => next,
        };

        match next {
            Some(Ok(Event::Open)) => {
                debug!("SSE connection opened");
                *attempts = 0;
            }
            Some(Ok(Event::Message(msg))) => match serde_json::from_str::<RelayEvent>(&msg.data) {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        return Disconnect::ReceiverGone;
                    }
                }
                Err(e) => {
                    warn!("Failed to parse SSE event data: {}", e);
                    debug!("Raw data: {}", msg.data);
                }
            },
            Some(Err(e)) => return Disconnect::Lost(e.to_string()),
            None => return Disconnect::Lost("stream ended".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_geometrically_to_cap() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(30));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_should_retry() {
        let unlimited = ReconnectConfig::default();
        assert!(unlimited.should_retry(1_000));

        let limited = ReconnectConfig {
            max_retries: Some(2),
            ..Default::default()
        };
        assert!(limited.should_retry(1));
        assert!(!limited.should_retry(2));
    }
}

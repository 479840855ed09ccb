//! Dashboard-side agent liveness monitor.
//!
//! Polls the heartbeat list on a fixed cadence and re-evaluates the
//! connection status every tick from the last fetched timestamp, so an agent
//! that stops sending heartbeats turns disconnected without a new poll.

use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, Fuse, FusedFuture, FutureExt};
use print_core::{evaluate, ConnectionStatus};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::{CloudClient, HeartbeatList};
use crate::error::Result;

/// Polling cadence of a [`HeartbeatMonitor`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How often the heartbeat list is fetched.
    pub poll_interval: Duration,
    /// How often the status is re-evaluated between polls.
    pub tick_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Background task publishing the connection status of a restaurant's agent.
pub struct HeartbeatMonitor {
    restaurant_id: String,
    status_rx: watch::Receiver<ConnectionStatus>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    /// Start monitoring a restaurant.
    pub fn start(client: CloudClient, restaurant_id: &str, config: MonitorConfig) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::disconnected());
        let (shutdown, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(run_monitor(
            client,
            restaurant_id.to_string(),
            config,
            status_tx,
            shutdown_rx,
        ));

        Self {
            restaurant_id: restaurant_id.to_string(),
            status_rx,
            shutdown: Some(shutdown),
            handle: Some(handle),
        }
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    pub fn restaurant_id(&self) -> &str {
        &self.restaurant_id
    }

    /// Stop polling. Calling it again has no effect.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            debug!(restaurant_id = %self.restaurant_id, "Heartbeat monitor stopped");
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_monitor(
    client: CloudClient,
    restaurant_id: String,
    config: MonitorConfig,
    status_tx: watch::Sender<ConnectionStatus>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick = tokio::time::interval(config.tick_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // At most one poll in flight; ticks keep running while it is pending.
    let mut fetch: Fuse<BoxFuture<'static, Result<HeartbeatList>>> = Fuse::terminated();
    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            result = &mut fetch, if !fetch.is_terminated() => {
                // The next poll is only scheduled once this one completes.
                poll.reset();
                match result {
                    Ok(list) => {
                        if consecutive_failures > 0 {
                            info!(restaurant_id = %restaurant_id, "Heartbeat polling restored");
                        }
                        consecutive_failures = 0;
                        let status = evaluate(list.heartbeats.first(), Utc::now());
                        status_tx.send_if_modified(|current| {
                            if *current != status {
                                *current = status;
                                true
                            } else {
                                false
                            }
                        });
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        if e.is_transient() {
                            debug!(restaurant_id = %restaurant_id, error = %e, consecutive_failures, "Heartbeat poll failed");
                        } else {
                            warn!(restaurant_id = %restaurant_id, error = %e, consecutive_failures, "Heartbeat poll failed");
                        }
                    }
                }
            }
            _ = poll.tick(), if fetch.is_terminated() => {
                let client = client.clone();
                let restaurant_id = restaurant_id.clone();
                fetch = async move { client.fetch_heartbeats(&restaurant_id).await }
                    .boxed()
                    .fuse();
            }
            _ = tick.tick() => {
                let now = Utc::now();
                status_tx.send_if_modified(|current| {
                    let before = current.clone();
                    current.retick(now);
                    *current != before
                });
            }
        }
    }
}

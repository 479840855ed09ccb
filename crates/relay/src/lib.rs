//! Per-restaurant change feed.
//!
//! Writers publish raw row changes; subscribers of a restaurant receive
//! heartbeat changes of any kind and order updates that moved the print
//! status into `printed`. Events of one restaurant arrive in publish order.
//!
//! # Example
//!
//! ```no_run
//! use relay::{Change, Relay};
//! use print_core::{ChangeOp, HeartbeatRecord};
//!
//! # async fn example() -> Result<(), relay::Error> {
//! let relay = Relay::default();
//! let mut subscription = relay.subscribe("r1")?;
//!
//! let heartbeat = HeartbeatRecord::new("r1", "agent-1", chrono::Utc::now());
//! relay.publish(Change::Heartbeat { op: ChangeOp::Update, heartbeat });
//!
//! if let Some(event) = subscription.recv().await {
//!     println!("{}", event.name());
//! }
//! subscription.stop();
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::Stream;
use print_core::{is_printed_transition, ChangeOp, HeartbeatRecord, RelayEvent};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of events buffered per restaurant before slow subscribers lag.
pub const DEFAULT_CAPACITY: usize = 256;

/// Errors that can occur during relay operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Subscriptions must name a restaurant.
    #[error("restaurant_id is required")]
    MissingRestaurant,
}

/// A row change reported by a writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A heartbeat row was inserted or updated.
    Heartbeat {
        op: ChangeOp,
        heartbeat: HeartbeatRecord,
    },
    /// An order row was written; statuses are the print status before and after.
    Order {
        restaurant_id: String,
        order_id: String,
        order_number: Option<i64>,
        order_type: Option<String>,
        old_status: Option<String>,
        new_status: Option<String>,
    },
}

impl Change {
    /// The event subscribers see for this change, if any.
    pub fn into_event(self) -> Option<RelayEvent> {
        match self {
            Change::Heartbeat { op, heartbeat } => Some(RelayEvent::HeartbeatChanged { op, heartbeat }),
            Change::Order {
                restaurant_id,
                order_id,
                order_number,
                order_type,
                old_status,
                new_status,
            } => is_printed_transition(old_status.as_deref(), new_status.as_deref()).then_some(
                RelayEvent::OrderPrinted {
                    restaurant_id,
                    order_id,
                    order_number,
                    order_type,
                },
            ),
        }
    }

    fn restaurant_id(&self) -> &str {
        match self {
            Change::Heartbeat { heartbeat, .. } => &heartbeat.restaurant_id,
            Change::Order { restaurant_id, .. } => restaurant_id,
        }
    }
}

struct Channels {
    capacity: usize,
    senders: Mutex<HashMap<String, broadcast::Sender<RelayEvent>>>,
}

impl Channels {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<RelayEvent>>> {
        self.senders.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop the channel of a restaurant once nobody listens to it.
    fn release(&self, restaurant_id: &str) {
        let mut senders = self.lock();
        if let Some(sender) = senders.get(restaurant_id) {
            if sender.receiver_count() == 0 {
                senders.remove(restaurant_id);
                debug!(restaurant_id = %restaurant_id, "Relay channel released");
            }
        }
    }
}

/// Publish/subscribe hub keyed by restaurant.
#[derive(Clone)]
pub struct Relay {
    channels: Arc<Channels>,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Relay {
    /// Create a relay buffering `capacity` events per restaurant.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Channels {
                capacity: capacity.max(1),
                senders: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to the events of one restaurant.
    pub fn subscribe(&self, restaurant_id: &str) -> Result<Subscription, Error> {
        let restaurant_id = restaurant_id.trim();
        if restaurant_id.is_empty() {
            return Err(Error::MissingRestaurant);
        }

        let receiver = {
            let mut senders = self.channels.lock();
            senders
                .entry(restaurant_id.to_string())
                .or_insert_with(|| broadcast::channel(self.channels.capacity).0)
                .subscribe()
        };

        debug!(restaurant_id = %restaurant_id, "Relay subscription started");

        Ok(Subscription {
            restaurant_id: restaurant_id.to_string(),
            receiver: Some(receiver),
            channels: Arc::downgrade(&self.channels),
        })
    }

    /// Publish a change. Returns the number of subscribers it reached.
    pub fn publish(&self, change: Change) -> usize {
        let restaurant_id = change.restaurant_id().to_string();
        let Some(event) = change.into_event() else {
            return 0;
        };

        let senders = self.channels.lock();
        match senders.get(&restaurant_id) {
            // Fails only when every receiver is gone, which is the same as no subscriber.
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Number of live subscriptions for a restaurant.
    pub fn subscriber_count(&self, restaurant_id: &str) -> usize {
        self.channels
            .lock()
            .get(restaurant_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

/// A live subscription to one restaurant's events.
///
/// Stops on [`Subscription::stop`] or when dropped.
pub struct Subscription {
    restaurant_id: String,
    receiver: Option<broadcast::Receiver<RelayEvent>>,
    channels: Weak<Channels>,
}

impl Subscription {
    pub fn restaurant_id(&self) -> &str {
        &self.restaurant_id
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the subscription is stopped or the relay is gone.
    /// A subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<RelayEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        restaurant_id = %self.restaurant_id,
                        skipped,
                        "Relay subscriber lagged, events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving events. Calling it again has no effect.
    pub fn stop(&mut self) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };
        drop(receiver);

        if let Some(channels) = self.channels.upgrade() {
            channels.release(&self.restaurant_id);
        }
        debug!(restaurant_id = %self.restaurant_id, "Relay subscription stopped");
    }

    /// Turn the subscription into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = RelayEvent> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            let event = subscription.recv().await?;
            Some((event, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("restaurant_id", &self.restaurant_id)
            .field("active", &self.is_active())
            .finish()
    }
}

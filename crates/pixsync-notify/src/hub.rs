//! Subscription registry and fan-out.

use crate::error::SubscriberDeliveryError;
use crate::frame::EventFrame;
use crate::sink::EventSink;
use pixsync_core::{ChangeEvent, Channel};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscription {
    /// `None` receives every channel.
    channel: Option<Channel>,
    sink: Arc<dyn EventSink>,
}

/// Result of one publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: Vec<SubscriptionId>,
}

/// Pushes change frames to every matching subscriber.
///
/// Sends happen on a snapshot of the registry taken under a read lock,
/// so a stuck or failing subscriber never holds up registration or the
/// other subscribers. Subscribers that fail are removed afterwards.
#[derive(Clone, Default)]
pub struct Notifier {
    subscriptions: Arc<RwLock<HashMap<SubscriptionId, Subscription>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber for one channel, or for all channels with `None`.
    pub async fn register(&self, sink: Arc<dyn EventSink>, channel: Option<Channel>) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscriptions
            .write()
            .await
            .insert(id, Subscription { channel, sink });

        match channel {
            Some(channel) => info!("Subscriber {} registered for {}", id, channel),
            None => info!("Subscriber {} registered for all channels", id),
        }
        id
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub async fn unregister(&self, id: SubscriptionId) {
        if self.subscriptions.write().await.remove(&id).is_some() {
            info!("Subscriber {} unregistered", id);
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Deliver `event` to the subscribers of `channel` and the global ones.
    pub async fn publish(&self, channel: Channel, event: &ChangeEvent) -> Delivery {
        match encode(event) {
            Some(text) => {
                self.fan_out(&text, |sub| sub.channel.map_or(true, |c| c == channel))
                    .await
            }
            None => Delivery::default(),
        }
    }

    /// Deliver `event` to every subscriber regardless of channel.
    pub async fn publish_global(&self, event: &ChangeEvent) -> Delivery {
        match encode(event) {
            Some(text) => self.fan_out(&text, |_| true).await,
            None => Delivery::default(),
        }
    }

    async fn fan_out<F>(&self, text: &str, matches: F) -> Delivery
    where
        F: Fn(&Subscription) -> bool,
    {
        let targets: Vec<(SubscriptionId, Arc<dyn EventSink>)> = {
            let subscriptions = self.subscriptions.read().await;
            subscriptions
                .iter()
                .filter(|(_, sub)| matches(sub))
                .map(|(id, sub)| (*id, Arc::clone(&sub.sink)))
                .collect()
        };

        let mut delivery = Delivery::default();
        for (id, sink) in targets {
            match sink.try_send(text) {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    match e {
                        SubscriberDeliveryError::Closed => debug!("Subscriber {} went away", id),
                        other => warn!("Dropping subscriber {}: {}", id, other),
                    }
                    delivery.dropped.push(id);
                }
            }
        }

        if !delivery.dropped.is_empty() {
            let mut subscriptions = self.subscriptions.write().await;
            for id in &delivery.dropped {
                subscriptions.remove(id);
            }
        }

        delivery
    }
}

fn encode(event: &ChangeEvent) -> Option<String> {
    match EventFrame::from(event).to_text() {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to serialize change for {}: {}", event.record.id, e);
            None
        }
    }
}

use crate::broker::{Queued, SubscriberId, Subscription};
use crate::domain::EventPublisher;
use common::domain::{DeviceId, Event};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Configuration for the event broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Bounded buffer size of every subscription
    pub subscriber_buffer_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer_capacity: 64,
        }
    }
}

struct SubscriberSlot {
    sender: mpsc::Sender<Queued>,
    dropped: Arc<AtomicU64>,
}

impl SubscriberSlot {
    /// Hand an event to this subscriber without waiting
    ///
    /// Some(false) when the buffer was full and the event dropped, None when
    /// the subscriber is gone.
    fn offer(&self, event: &Arc<Event>, subscriber_id: SubscriberId) -> Option<bool> {
        let dropped_before = self.dropped.swap(0, Ordering::AcqRel);
        match self.sender.try_send(Queued {
            event: Arc::clone(event),
            dropped_before,
        }) {
            Ok(()) => Some(true),
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(dropped_before + 1, Ordering::AcqRel)
                    + dropped_before
                    + 1;
                warn!(
                    device_id = %event.device_id,
                    subscriber_id,
                    dropped,
                    "subscriber buffer full, dropping event"
                );
                Some(false)
            }
            Err(TrySendError::Closed(_)) => None,
        }
    }
}

type Topic = RwLock<HashMap<SubscriberId, SubscriberSlot>>;

struct BrokerInner {
    topics: DashMap<DeviceId, Topic>,
    next_subscriber_id: AtomicU64,
    config: BrokerConfig,
}

/// In-process publish/subscribe router keyed by device
///
/// Every subscription has its own bounded buffer. Publishing never waits: an
/// event that does not fit is dropped for that subscriber only and surfaces
/// to it as [`Delivery::Overflow`](crate::Delivery::Overflow). Publishes to
/// different devices do not contend; publishes to one device serialize only
/// against subscribe/unsubscribe on that device.
///
/// Cloning is cheap and every clone routes through the same topics.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                topics: DashMap::new(),
                next_subscriber_id: AtomicU64::new(1),
                config: BrokerConfig {
                    subscriber_buffer_capacity: config.subscriber_buffer_capacity.max(1),
                },
            }),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Join a device topic; the subscription sees only events published after this returns
    pub fn subscribe(&self, device_id: DeviceId) -> Subscription {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.inner.config.subscriber_buffer_capacity);
        let dropped = Arc::new(AtomicU64::new(0));

        // Insert while holding the entry so a concurrent unsubscribe cannot
        // remove the topic between creation and insertion
        self.inner
            .topics
            .entry(device_id)
            .or_default()
            .write()
            .insert(
                id,
                SubscriberSlot {
                    sender,
                    dropped: Arc::clone(&dropped),
                },
            );

        debug!(device_id = %device_id, subscriber_id = id, "subscriber joined topic");

        Subscription::new(id, device_id, receiver, dropped, self.clone())
    }

    /// Leave a device topic, removing the topic once it has no subscribers
    ///
    /// Returns whether the subscriber was still a member.
    pub fn unsubscribe(&self, device_id: DeviceId, subscriber_id: SubscriberId) -> bool {
        let mut removed = false;
        self.inner.topics.remove_if(&device_id, |_, topic| {
            let mut subscribers = topic.write();
            removed = subscribers.remove(&subscriber_id).is_some();
            subscribers.is_empty()
        });

        if removed {
            debug!(device_id = %device_id, subscriber_id, "subscriber left topic");
        }
        removed
    }

    /// Number of live subscribers of a device
    pub fn subscriber_count(&self, device_id: DeviceId) -> usize {
        self.inner
            .topics
            .get(&device_id)
            .map(|topic| topic.read().len())
            .unwrap_or(0)
    }

    /// Number of devices with at least one subscriber
    pub fn topic_count(&self) -> usize {
        self.inner.topics.len()
    }

    fn publish_event(&self, event: &Arc<Event>) -> usize {
        let device_id = event.device_id;
        let mut delivered = 0;
        let mut gone = Vec::new();

        if let Some(topic) = self.inner.topics.get(&device_id) {
            for (subscriber_id, slot) in topic.read().iter() {
                match slot.offer(event, *subscriber_id) {
                    Some(true) => delivered += 1,
                    Some(false) => {}
                    None => gone.push(*subscriber_id),
                }
            }
        }

        for subscriber_id in gone {
            self.unsubscribe(device_id, subscriber_id);
        }

        debug!(device_id = %device_id, delivered, "published event");
        delivered
    }

    fn close(&self, device_id: DeviceId) -> usize {
        match self.inner.topics.remove(&device_id) {
            Some((_, topic)) => {
                let closed = topic.read().len();
                debug!(device_id = %device_id, closed, "closed topic");
                closed
            }
            None => 0,
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl EventPublisher for Broker {
    fn publish(&self, event: Arc<Event>) -> usize {
        self.publish_event(&event)
    }

    fn close_topic(&self, device_id: DeviceId) -> usize {
        self.close(device_id)
    }
}

use crate::broker::Broker;
use common::domain::{DeviceId, Event};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};

pub type SubscriberId = u64;

/// What a subscription yields next.
#[derive(Debug, Clone)]
pub enum Delivery {
    Event(Arc<Event>),
    /// Events were dropped because this subscriber's buffer was full
    Overflow { dropped: u64 },
}

/// Buffer entry; `dropped_before` counts events lost just ahead of this one.
#[derive(Debug)]
pub(crate) struct Queued {
    pub(crate) event: Arc<Event>,
    pub(crate) dropped_before: u64,
}

/// A live watcher of one device's events
///
/// Owns the receiving half of its bounded buffer. Dropping the subscription
/// leaves the topic.
pub struct Subscription {
    id: SubscriberId,
    device_id: DeviceId,
    receiver: mpsc::Receiver<Queued>,
    dropped: Arc<AtomicU64>,
    pending: Option<Arc<Event>>,
    broker: Broker,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        device_id: DeviceId,
        receiver: mpsc::Receiver<Queued>,
        dropped: Arc<AtomicU64>,
        broker: Broker,
    ) -> Self {
        Self {
            id,
            device_id,
            receiver,
            dropped,
            pending: None,
            broker,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Wait for the next delivery
    ///
    /// An overflow is reported exactly where the gap is: after the events
    /// buffered before the drop, ahead of the first event after it. Returns
    /// None once the topic has been closed and the buffer is drained.
    ///
    /// Cancel safe: dropping the future before it resolves loses nothing.
    pub async fn recv(&mut self) -> Option<Delivery> {
        if let Some(event) = self.pending.take() {
            return Some(Delivery::Event(event));
        }

        let queued = match self.receiver.try_recv() {
            Ok(queued) => queued,
            Err(TryRecvError::Empty) => {
                if let Some(overflow) = self.take_overflow() {
                    return Some(overflow);
                }
                match self.receiver.recv().await {
                    Some(queued) => queued,
                    None => return self.take_overflow(),
                }
            }
            Err(TryRecvError::Disconnected) => return self.take_overflow(),
        };

        if queued.dropped_before > 0 {
            self.pending = Some(queued.event);
            return Some(Delivery::Overflow {
                dropped: queued.dropped_before,
            });
        }
        Some(Delivery::Event(queued.event))
    }

    /// Leave the topic now
    pub fn unsubscribe(self) {
        drop(self);
    }

    fn take_overflow(&self) -> Option<Delivery> {
        match self.dropped.swap(0, Ordering::AcqRel) {
            0 => None,
            dropped => Some(Delivery::Overflow { dropped }),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(self.device_id, self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("device_id", &self.device_id)
            .finish()
    }
}

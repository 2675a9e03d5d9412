use common::domain::{DeviceId, Event};
use std::sync::Arc;

/// Fan-out of freshly stored events to live consumers of a device topic
///
/// The in-process broker is the primary implementation; other delivery
/// transports (MQTT bridge, webhooks) consume the same events through this seam.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait EventPublisher: Send + Sync {
    /// Deliver an event to every current subscriber of its device, returning
    /// how many subscribers accepted it
    fn publish(&self, event: Arc<Event>) -> usize;

    /// End every subscription of a device
    fn close_topic(&self, device_id: DeviceId) -> usize;
}

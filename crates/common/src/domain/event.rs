use crate::domain::device_id::DeviceId;
use crate::domain::readings::Readings;
use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One decoded uplink occurrence. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub device_id: DeviceId,
    pub received_at: DateTime<Utc>,
    pub readings: Readings,
}

/// Ordered, finite sequence of events returned by a history query.
pub type EventStream = BoxStream<'static, Arc<Event>>;

/// Input for querying a device's event history
///
/// `from` is inclusive and `to` is exclusive; either bound may be omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEventsInput {
    pub device_id: DeviceId,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl QueryEventsInput {
    pub fn all(device_id: DeviceId) -> Self {
        Self {
            device_id,
            from: None,
            to: None,
            limit: None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(DomainError::InvalidTimeRange(format!(
                    "from ({}) is after to ({})",
                    from.to_rfc3339(),
                    to.to_rfc3339()
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.from.map_or(true, |from| event.received_at >= from)
            && self.to.map_or(true, |to| event.received_at < to)
    }
}

/// Storage for the per-device append-only event log
///
/// Implementations should:
/// - Keep append order per device and return events in that order
/// - Allow at most one concurrent writer per device
/// - Apply retention without failing an append
/// - Return StorageUnavailable when the backing store cannot be reached
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append an event to its device log, returning its storage sequence number
    async fn append(&self, event: Arc<Event>) -> DomainResult<u64>;

    /// Snapshot the matching events of one device, oldest first
    async fn query(&self, input: QueryEventsInput) -> DomainResult<EventStream>;

    /// Number of events currently retained for a device
    async fn count(&self, device_id: DeviceId) -> DomainResult<usize>;

    /// Drop every event of a device, returning how many were removed
    async fn purge_device(&self, device_id: DeviceId) -> DomainResult<usize>;

    /// Apply age-based retention to every device log, returning how many were evicted
    async fn apply_retention(&self, now: DateTime<Utc>) -> DomainResult<usize>;
}

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::domain::{DeviceId, DomainResult, Event, EventStore, EventStream, QueryEventsInput};
use dashmap::DashMap;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Bounds on how many and how old events are kept per device
///
/// Eviction always removes the oldest entries first and never drops a log
/// below `min_events`, even when those entries are past `max_age`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum number of events per device, None for unbounded
    pub max_events: Option<usize>,
    /// Maximum age of an event, None for unbounded
    pub max_age: Option<Duration>,
    /// Number of newest events always kept
    pub min_events: usize,
}

impl RetentionPolicy {
    pub fn unbounded() -> Self {
        Self {
            max_events: None,
            max_age: None,
            min_events: 0,
        }
    }

    /// Count bound after applying the retention floor
    fn effective_max_events(&self) -> Option<usize> {
        self.max_events.map(|max| max.max(self.min_events))
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_events: Some(10_000),
            max_age: Some(Duration::days(7)),
            min_events: 10,
        }
    }
}

struct DeviceLog {
    entries: VecDeque<Arc<Event>>,
    next_sequence: u64,
}

impl DeviceLog {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_sequence: 0,
        }
    }

    fn evict_over_count(&mut self, policy: &RetentionPolicy) -> usize {
        let Some(max_events) = policy.effective_max_events() else {
            return 0;
        };
        let excess = self.entries.len().saturating_sub(max_events);
        self.entries.drain(..excess);
        excess
    }

    fn evict_expired(&mut self, policy: &RetentionPolicy, now: DateTime<Utc>) -> usize {
        let Some(max_age) = policy.max_age else {
            return 0;
        };
        let cutoff = now - max_age;
        let mut evicted = 0;
        while self.entries.len() > policy.min_events
            && self
                .entries
                .front()
                .is_some_and(|oldest| oldest.received_at < cutoff)
        {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }
}

/// In-memory implementation of EventStore
///
/// Each device has its own log behind its own lock, so appends to different
/// devices never contend and queries read a consistent per-device snapshot.
pub struct InMemoryEventStore {
    logs: DashMap<DeviceId, Arc<RwLock<DeviceLog>>>,
    retention: RetentionPolicy,
}

impl InMemoryEventStore {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            logs: DashMap::new(),
            retention,
        }
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    /// Number of devices with a log
    pub fn device_count(&self) -> usize {
        self.logs.len()
    }

    fn log_for(&self, device_id: DeviceId) -> Arc<RwLock<DeviceLog>> {
        Arc::clone(
            self.logs
                .entry(device_id)
                .or_insert_with(|| Arc::new(RwLock::new(DeviceLog::new())))
                .value(),
        )
    }

    /// Remove logs that hold no events and that nobody else is using
    ///
    /// A log referenced outside the map belongs to an in-flight append or
    /// query and is kept; `log_for` clones under the same shard lock.
    fn prune_empty_logs(&self) -> usize {
        let before = self.logs.len();
        self.logs.retain(|_, log| {
            Arc::strong_count(log) > 1
                || log.try_read().map_or(true, |log| !log.entries.is_empty())
        });
        before.saturating_sub(self.logs.len())
    }

    fn existing_log(&self, device_id: &DeviceId) -> Option<Arc<RwLock<DeviceLog>>> {
        self.logs.get(device_id).map(|log| Arc::clone(log.value()))
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: Arc<Event>) -> DomainResult<u64> {
        let log = self.log_for(event.device_id);
        let mut log = log.write().await;

        let sequence = log.next_sequence;
        log.next_sequence += 1;
        log.entries.push_back(Arc::clone(&event));

        let evicted = log.evict_over_count(&self.retention)
            + log.evict_expired(&self.retention, Utc::now());
        if evicted > 0 {
            debug!(
                device_id = %event.device_id,
                evicted,
                retained = log.entries.len(),
                "evicted events past retention"
            );
        }

        Ok(sequence)
    }

    async fn query(&self, input: QueryEventsInput) -> DomainResult<EventStream> {
        let Some(log) = self.existing_log(&input.device_id) else {
            return Ok(futures::stream::empty().boxed());
        };

        let snapshot: Vec<Arc<Event>> = {
            let log = log.read().await;
            log.entries
                .iter()
                .filter(|event| input.matches(event))
                .take(input.limit.unwrap_or(usize::MAX))
                .cloned()
                .collect()
        };

        Ok(futures::stream::iter(snapshot).boxed())
    }

    async fn count(&self, device_id: DeviceId) -> DomainResult<usize> {
        match self.existing_log(&device_id) {
            Some(log) => Ok(log.read().await.entries.len()),
            None => Ok(0),
        }
    }

    async fn purge_device(&self, device_id: DeviceId) -> DomainResult<usize> {
        let Some((_, log)) = self.logs.remove(&device_id) else {
            return Ok(0);
        };
        let purged = log.read().await.entries.len();
        debug!(device_id = %device_id, purged, "purged device event log");
        Ok(purged)
    }

    async fn apply_retention(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let logs: Vec<Arc<RwLock<DeviceLog>>> = self
            .logs
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut evicted = 0;
        for log in logs {
            evicted += log.write().await.evict_expired(&self.retention, now);
        }

        let pruned = self.prune_empty_logs();
        if pruned > 0 {
            debug!(pruned, "dropped empty device logs");
        }
        Ok(evicted)
    }
}

/// Periodically apply age-based retention until cancelled
pub async fn run_retention_sweeper(
    event_store: Arc<dyn EventStore>,
    interval: std::time::Duration,
    ctx: CancellationToken,
) -> anyhow::Result<()> {
    info!(interval_secs = interval.as_secs(), "starting retention sweeper");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                info!("retention sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                let evicted = event_store.apply_retention(Utc::now()).await?;
                if evicted > 0 {
                    info!(evicted, "retention sweep evicted expired events");
                } else {
                    debug!("retention sweep found nothing to evict");
                }
            }
        }
    }

    Ok(())
}

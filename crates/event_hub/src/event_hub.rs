use crate::broker::{Broker, BrokerConfig, Subscription};
use crate::domain::{EventPublisher, IngestService, QueryService};
use crate::memory::{run_retention_sweeper, InMemoryEventStore, RetentionPolicy};
use crate::streaming::{DeviceEventStream, StreamingGateway, StreamingGatewayConfig};
use common::domain::{
    CodecBindingStore, DeviceId, DomainResult, Event, EventStore, EventStream, QueryEventsInput,
};
use common::proto::StreamDeviceEventsRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, info, instrument};
use uplink_payload::CodecRegistry;
use uplink_runner::AppProcess;

/// Configuration for the event hub module
#[derive(Debug, Clone)]
pub struct EventHubConfig {
    pub retention: RetentionPolicy,
    pub retention_sweep_interval: Duration,
    pub broker: BrokerConfig,
    pub streaming: StreamingGatewayConfig,
}

impl Default for EventHubConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            retention_sweep_interval: Duration::from_secs(60),
            broker: BrokerConfig::default(),
            streaming: StreamingGatewayConfig::default(),
        }
    }
}

/// Ingestion and live distribution of device events
///
/// Wires the ingest and query services, the event store, the broker and the
/// streaming gateway together and exposes the external entry points.
pub struct EventHub {
    ingest_service: IngestService,
    query_service: QueryService,
    streaming_gateway: StreamingGateway,
    event_store: Arc<dyn EventStore>,
    broker: Broker,
    retention_sweep_interval: Duration,
}

impl EventHub {
    pub fn new(
        codecs: CodecRegistry,
        codec_bindings: Arc<dyn CodecBindingStore>,
        event_store: Arc<dyn EventStore>,
        config: EventHubConfig,
    ) -> Self {
        debug!(codecs = ?codecs.names(), "initializing event hub");

        let broker = Broker::new(config.broker);
        let publisher: Arc<dyn EventPublisher> = Arc::new(broker.clone());

        let ingest_service = IngestService::new(
            codec_bindings,
            Arc::new(codecs),
            Arc::clone(&event_store),
            publisher,
        );
        let query_service = QueryService::new(Arc::clone(&event_store));
        let streaming_gateway = StreamingGateway::new(broker.clone(), config.streaming);

        Self {
            ingest_service,
            query_service,
            streaming_gateway,
            event_store,
            broker,
            retention_sweep_interval: config.retention_sweep_interval,
        }
    }

    /// Event hub backed by the in-memory event store
    pub fn in_memory(
        codecs: CodecRegistry,
        codec_bindings: Arc<dyn CodecBindingStore>,
        config: EventHubConfig,
    ) -> Self {
        let event_store = Arc::new(InMemoryEventStore::new(config.retention));
        Self::new(codecs, codec_bindings, event_store, config)
    }

    /// Decode, store and publish one uplink payload
    pub async fn ingest(&self, device_id: DeviceId, payload: &[u8]) -> DomainResult<Arc<Event>> {
        self.ingest_service.ingest(device_id, payload).await
    }

    /// History of one device, oldest first
    pub async fn query_events(&self, input: QueryEventsInput) -> DomainResult<EventStream> {
        self.query_service.query_events(input).await
    }

    /// Server-streaming subscription to a device's live events
    pub fn stream_device_events(
        &self,
        request: StreamDeviceEventsRequest,
        ctx: CancellationToken,
    ) -> Result<DeviceEventStream, Status> {
        self.streaming_gateway.stream_device_events(request, ctx)
    }

    /// Raw broker subscription, for in-process consumers
    pub fn subscribe(&self, device_id: DeviceId) -> Subscription {
        self.broker.subscribe(device_id)
    }

    /// Forget a deleted device: purge its event log and complete its live streams
    #[instrument(skip(self), fields(device_id = %device_id))]
    pub async fn remove_device(&self, device_id: DeviceId) -> DomainResult<usize> {
        let (purged, closed) = self
            .ingest_service
            .with_device_exclusive(device_id, || async {
                let purged = self.event_store.purge_device(device_id).await?;
                let closed = self.broker.close_topic(device_id);
                DomainResult::Ok((purged, closed))
            })
            .await?;

        info!(purged, closed_streams = closed, "removed device");
        Ok(purged)
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    pub fn streaming_gateway(&self) -> &StreamingGateway {
        &self.streaming_gateway
    }

    pub fn event_store(&self) -> Arc<dyn EventStore> {
        Arc::clone(&self.event_store)
    }

    /// Background process applying age-based retention on an interval
    pub fn retention_sweeper_process(&self) -> AppProcess {
        let event_store = Arc::clone(&self.event_store);
        let interval = self.retention_sweep_interval;
        Box::new(move |ctx| {
            Box::pin(async move { run_retention_sweeper(event_store, interval, ctx).await })
        })
    }
}

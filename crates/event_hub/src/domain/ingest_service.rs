use crate::domain::EventPublisher;
use chrono::Utc;
use common::domain::{CodecBindingStore, DeviceId, DomainError, DomainResult, Event, EventStore};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uplink_payload::CodecRegistry;

/// Domain service that turns raw uplink payloads into stored, published events
///
/// Flow:
/// 1. Resolve the device's codec binding
/// 2. Decode the payload with the bound codec (all-or-nothing)
/// 3. Append the event to the event store
/// 4. Publish the event to live subscribers
///
/// Ingestion is sequential per device so events are published in append order;
/// different devices ingest concurrently.
pub struct IngestService {
    codec_bindings: Arc<dyn CodecBindingStore>,
    codecs: Arc<CodecRegistry>,
    event_store: Arc<dyn EventStore>,
    publisher: Arc<dyn EventPublisher>,
    device_locks: DashMap<DeviceId, Arc<Mutex<()>>>,
}

impl IngestService {
    pub fn new(
        codec_bindings: Arc<dyn CodecBindingStore>,
        codecs: Arc<CodecRegistry>,
        event_store: Arc<dyn EventStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            codec_bindings,
            codecs,
            event_store,
            publisher,
            device_locks: DashMap::new(),
        }
    }

    /// Decode, store and publish one uplink payload
    ///
    /// Returns the stored event. A malformed payload stores and publishes
    /// nothing; store errors are returned as-is and nothing is published.
    #[instrument(skip(self, payload), fields(device_id = %device_id, payload_size = payload.len()))]
    pub async fn ingest(&self, device_id: DeviceId, payload: &[u8]) -> DomainResult<Arc<Event>> {
        let codec_name = self
            .codec_bindings
            .codec_name_for(device_id)
            .await?
            .ok_or_else(|| DomainError::CodecBindingNotFound(device_id.to_hex()))?;

        let codec = self.codecs.get(&codec_name)?;

        let readings = codec.decode(payload).map_err(|e| {
            warn!(codec = %codec_name, error = %e, "rejecting malformed payload");
            e
        })?;

        debug!(
            codec = %codec_name,
            reading_count = readings.len(),
            "decoded uplink payload"
        );

        self.with_device_exclusive(device_id, move || async move {
            let event = Arc::new(Event {
                device_id,
                received_at: Utc::now(),
                readings,
            });

            let sequence = self.event_store.append(Arc::clone(&event)).await?;
            let delivered = self.publisher.publish(Arc::clone(&event));

            debug!(sequence, delivered, "stored and published event");

            DomainResult::Ok(event)
        })
        .await
    }

    /// Hold the device's ingest lock while `f` runs, so no ingest for that
    /// device interleaves with it
    ///
    /// The lock entry is dropped afterwards unless another caller is waiting
    /// on it, so idle devices hold no lock.
    pub async fn with_device_exclusive<F, Fut, T>(&self, device_id: DeviceId, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let device_lock = self.device_lock(device_id);
        let result = {
            let _guard = device_lock.lock().await;
            f().await
        };
        self.device_locks
            .remove_if(&device_id, |_, lock| Arc::strong_count(lock) <= 2);
        result
    }

    fn device_lock(&self, device_id: DeviceId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.device_locks
                .entry(device_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockEventPublisher;
    use common::domain::{MockCodecBindingStore, MockEventStore};

    const DEVICE: DeviceId = DeviceId::new([1, 2, 3, 4, 5, 6, 7, 8]);

    fn service(
        bindings: MockCodecBindingStore,
        store: MockEventStore,
        publisher: MockEventPublisher,
    ) -> IngestService {
        IngestService::new(
            Arc::new(bindings),
            Arc::new(CodecRegistry::with_builtin_codecs()),
            Arc::new(store),
            Arc::new(publisher),
        )
    }

    fn bound_to_cayenne() -> MockCodecBindingStore {
        let mut bindings = MockCodecBindingStore::new();
        bindings
            .expect_codec_name_for()
            .withf(|device_id: &DeviceId| *device_id == DEVICE)
            .returning(|_| Ok(Some("cayenne_lpp".to_string())));
        bindings
    }

    #[tokio::test]
    async fn test_ingest_stores_then_publishes() {
        // Arrange
        let mut store = MockEventStore::new();
        let mut publisher = MockEventPublisher::new();
        let mut seq = mockall::Sequence::new();

        store
            .expect_append()
            .withf(|event: &Arc<Event>| {
                event.device_id == DEVICE && event.readings.temperature_sensor.get(&1) == Some(&20.0)
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(0));

        publisher
            .expect_publish()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| 1);

        let service = service(bound_to_cayenne(), store, publisher);

        // Act
        let event = service.ingest(DEVICE, &[0x01, 0x67, 0x00, 0xC8]).await.unwrap();

        // Assert
        assert_eq!(event.device_id, DEVICE);
        assert_eq!(event.readings.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_empty_payload_still_stored() {
        // Arrange
        let mut store = MockEventStore::new();
        let mut publisher = MockEventPublisher::new();

        store
            .expect_append()
            .withf(|event: &Arc<Event>| event.readings.is_empty())
            .times(1)
            .returning(|_| Ok(0));
        publisher.expect_publish().times(1).returning(|_| 0);

        let service = service(bound_to_cayenne(), store, publisher);

        // Act
        let result = service.ingest(DEVICE, &[]).await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_payload_stores_and_publishes_nothing() {
        // Arrange
        let mut store = MockEventStore::new();
        let mut publisher = MockEventPublisher::new();
        store.expect_append().never();
        publisher.expect_publish().never();

        let service = service(bound_to_cayenne(), store, publisher);

        // Act
        let result = service.ingest(DEVICE, &[0x01, 0xFF, 0x00]).await;

        // Assert
        assert!(matches!(result, Err(DomainError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_and_skips_publish() {
        // Arrange
        let mut store = MockEventStore::new();
        let mut publisher = MockEventPublisher::new();
        store
            .expect_append()
            .times(1)
            .returning(|_| Err(DomainError::StorageUnavailable("disk offline".to_string())));
        publisher.expect_publish().never();

        let service = service(bound_to_cayenne(), store, publisher);

        // Act
        let result = service.ingest(DEVICE, &[0x01, 0x67, 0x00, 0xC8]).await;

        // Assert
        assert!(matches!(result, Err(DomainError::StorageUnavailable(msg)) if msg == "disk offline"));
    }

    #[tokio::test]
    async fn test_unbound_device_rejected() {
        // Arrange
        let mut bindings = MockCodecBindingStore::new();
        bindings.expect_codec_name_for().returning(|_| Ok(None));
        let mut store = MockEventStore::new();
        store.expect_append().never();

        let service = service(bindings, store, MockEventPublisher::new());

        // Act
        let result = service.ingest(DEVICE, &[0x01, 0x67, 0x00, 0xC8]).await;

        // Assert
        assert!(matches!(result, Err(DomainError::CodecBindingNotFound(id)) if id == "0102030405060708"));
    }

    #[tokio::test]
    async fn test_binding_to_unregistered_codec_rejected() {
        // Arrange
        let mut bindings = MockCodecBindingStore::new();
        bindings
            .expect_codec_name_for()
            .returning(|_| Ok(Some("protobuf".to_string())));

        let service = service(bindings, MockEventStore::new(), MockEventPublisher::new());

        // Act
        let result = service.ingest(DEVICE, &[0x01]).await;

        // Assert
        assert!(matches!(result, Err(DomainError::CodecNotFound(name)) if name == "protobuf"));
    }

    #[tokio::test]
    async fn test_device_exclusive_releases_lock_entry() {
        let service = service(
            MockCodecBindingStore::new(),
            MockEventStore::new(),
            MockEventPublisher::new(),
        );

        let value = service.with_device_exclusive(DEVICE, || async { 7 }).await;

        assert_eq!(value, 7);
        assert!(service.device_locks.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_leaves_no_idle_lock_entries() {
        // Arrange
        let mut store = MockEventStore::new();
        let mut publisher = MockEventPublisher::new();
        let mut appends = 0;
        store.expect_append().times(2).returning(move |_| {
            appends += 1;
            if appends == 1 {
                Ok(0)
            } else {
                Err(DomainError::StorageUnavailable("disk offline".to_string()))
            }
        });
        publisher.expect_publish().times(1).returning(|_| 0);

        let service = service(bound_to_cayenne(), store, publisher);

        // Act
        let stored = service.ingest(DEVICE, &[0x01, 0x67, 0x00, 0xC8]).await;
        let failed = service.ingest(DEVICE, &[0x01, 0x67, 0x00, 0xC8]).await;

        // Assert
        assert!(stored.is_ok());
        assert!(failed.is_err());
        assert!(service.device_locks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ingest_leaves_no_idle_lock_entries() {
        // Arrange
        let mut store = MockEventStore::new();
        let mut publisher = MockEventPublisher::new();
        store.expect_append().times(32).returning(|_| Ok(0));
        publisher.expect_publish().times(32).returning(|_| 0);
        let service = Arc::new(service(bound_to_cayenne(), store, publisher));

        // Act
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.ingest(DEVICE, &[0x01, 0x67, 0x00, 0xC8]).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        // Assert
        assert!(service.device_locks.is_empty());
    }
}

use common::domain::{DomainResult, EventStore, EventStream, QueryEventsInput};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Read side of the event log: history queries per device
pub struct QueryService {
    event_store: Arc<dyn EventStore>,
}

impl QueryService {
    pub fn new(event_store: Arc<dyn EventStore>) -> Self {
        Self { event_store }
    }

    /// Events of one device in append order, oldest first, within `[from, to)`
    /// and truncated to `limit`
    #[instrument(skip(self), fields(device_id = %input.device_id))]
    pub async fn query_events(&self, input: QueryEventsInput) -> DomainResult<EventStream> {
        input.validate()?;

        debug!(
            from = ?input.from,
            to = ?input.to,
            limit = ?input.limit,
            "querying device event history"
        );

        self.event_store.query(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::domain::{DeviceId, DomainError, Event, MockEventStore, Readings};
    use futures::StreamExt;

    const DEVICE: DeviceId = DeviceId::new([1, 2, 3, 4, 5, 6, 7, 8]);

    #[tokio::test]
    async fn test_query_forwards_to_store() {
        // Arrange
        let mut store = MockEventStore::new();
        store
            .expect_query()
            .withf(|input: &QueryEventsInput| input.device_id == DEVICE && input.limit == Some(1))
            .times(1)
            .returning(|input| {
                let event = Arc::new(Event {
                    device_id: input.device_id,
                    received_at: Utc::now(),
                    readings: Readings::new(),
                });
                Ok(futures::stream::iter(vec![event]).boxed())
            });

        let service = QueryService::new(Arc::new(store));

        // Act
        let events: Vec<_> = service
            .query_events(QueryEventsInput {
                limit: Some(1),
                ..QueryEventsInput::all(DEVICE)
            })
            .await
            .unwrap()
            .collect()
            .await;

        // Assert
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_inverted_range_never_reaches_store() {
        // Arrange
        let mut store = MockEventStore::new();
        store.expect_query().never();
        let service = QueryService::new(Arc::new(store));
        let now = Utc::now();

        // Act
        let result = service
            .query_events(QueryEventsInput {
                device_id: DEVICE,
                from: Some(now),
                to: Some(now - Duration::minutes(5)),
                limit: None,
            })
            .await;

        // Assert
        assert!(matches!(result, Err(DomainError::InvalidTimeRange(_))));
    }
}

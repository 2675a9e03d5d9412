use crate::broker::{Broker, Delivery, Subscription};
use crate::streaming::{ChannelSink, EventSink, SinkError, StreamState};
use common::domain::DeviceId;
use common::grpc::domain_error_to_status;
use common::proto::{event_domain_to_proto, StreamDeviceEventsRequest, StreamDeviceEventsResponse};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, error, info, instrument, warn};

/// Response stream of a device event subscription
pub type DeviceEventStream = ReceiverStream<Result<StreamDeviceEventsResponse, Status>>;

/// Configuration for the streaming gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingGatewayConfig {
    /// Messages buffered between the delivery loop and the transport
    pub channel_capacity: usize,
}

impl Default for StreamingGatewayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 32,
        }
    }
}

/// Adapts subscribe requests into broker subscriptions drained into long-lived
/// response streams
pub struct StreamingGateway {
    broker: Broker,
    config: StreamingGatewayConfig,
}

impl StreamingGateway {
    pub fn new(broker: Broker, config: StreamingGatewayConfig) -> Self {
        Self { broker, config }
    }

    /// Server-streaming entry point
    ///
    /// Authorization has already happened. The subscription is in place when
    /// this returns; delivery runs on its own task until the client goes
    /// away, `ctx` is cancelled or the device topic is closed.
    pub fn stream_device_events(
        &self,
        request: StreamDeviceEventsRequest,
        ctx: CancellationToken,
    ) -> Result<DeviceEventStream, Status> {
        let device_id: DeviceId = request.device_id.parse().map_err(domain_error_to_status)?;

        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        let subscription = self.broker.subscribe(device_id);

        tokio::spawn(async move {
            let sink = ChannelSink::new(sender);
            deliver(subscription, &sink, ctx).await
        });

        Ok(ReceiverStream::new(receiver))
    }

    /// Subscribe to a device and forward its events into `sink` until a
    /// terminal state is reached
    pub async fn run_stream(
        &self,
        device_id: DeviceId,
        sink: &dyn EventSink,
        ctx: CancellationToken,
    ) -> StreamState {
        debug!(device_id = %device_id, state = %StreamState::Pending, "stream accepted");
        deliver(self.broker.subscribe(device_id), sink, ctx).await
    }
}

/// Delivery loop of one streaming call
///
/// Always leaves the topic before returning, whatever the terminal state.
#[instrument(skip_all, fields(device_id = %subscription.device_id(), subscriber_id = subscription.id()))]
pub async fn deliver(
    mut subscription: Subscription,
    sink: &dyn EventSink,
    ctx: CancellationToken,
) -> StreamState {
    debug!(state = %StreamState::Active, "stream active");

    let state = loop {
        let delivery = tokio::select! {
            biased;
            _ = ctx.cancelled() => break StreamState::Cancelled,
            _ = sink.closed() => break StreamState::Cancelled,
            delivery = subscription.recv() => delivery,
        };

        let message = match delivery {
            None => break StreamState::Completed,
            Some(Delivery::Event(event)) => match event_domain_to_proto(&event) {
                Ok(proto) => StreamDeviceEventsResponse::event(proto),
                Err(e) => {
                    error!(error = %e, "failed to encode event for the wire");
                    sink.abort(Status::internal("failed to encode event")).await;
                    break StreamState::Faulted;
                }
            },
            Some(Delivery::Overflow { dropped }) => {
                warn!(dropped, "subscriber fell behind, notifying client of overflow");
                StreamDeviceEventsResponse::overflow(dropped)
            }
        };

        let sent = tokio::select! {
            biased;
            _ = ctx.cancelled() => break StreamState::Cancelled,
            sent = sink.send(message) => sent,
        };

        match sent {
            Ok(()) => debug!("delivered message to client"),
            Err(SinkError::Disconnected) => break StreamState::Cancelled,
            Err(SinkError::Transport(e)) => {
                error!(error = %e, "failed to write to client");
                break StreamState::Faulted;
            }
        }
    };

    subscription.unsubscribe();
    info!(state = %state, "stream ended");
    state
}

use anyhow::Result;
use common::domain::DeviceId;
use common::proto::stream_device_events_response::Kind;
use common::proto::{struct_to_json_map, StreamDeviceEventsRequest};
use event_hub::EventHub;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Watch one device through the streaming gateway and log every message
pub async fn run_log_watcher(
    hub: Arc<EventHub>,
    device_id: DeviceId,
    ctx: CancellationToken,
) -> Result<()> {
    let mut stream = hub
        .stream_device_events(
            StreamDeviceEventsRequest {
                device_id: device_id.to_hex(),
            },
            ctx.child_token(),
        )
        .map_err(|status| anyhow::anyhow!("failed to open device stream: {}", status))?;

    info!(device_id = %device_id, "watching device events");

    let mut received: u64 = 0;
    while let Some(message) = stream.next().await {
        match message {
            Ok(response) => match response.kind {
                Some(Kind::Event(event)) => {
                    received += 1;
                    let readings = event
                        .readings
                        .as_ref()
                        .map(|r| serde_json::Value::Object(struct_to_json_map(r)))
                        .unwrap_or_default();
                    info!(
                        device_id = %event.device_id,
                        event_type = %event.event_type,
                        readings = %readings,
                        "device event"
                    );
                }
                Some(Kind::Overflow(overflow)) => {
                    warn!(dropped = overflow.dropped, "watcher fell behind");
                }
                None => warn!("empty stream message"),
            },
            Err(status) => {
                warn!(code = ?status.code(), message = status.message(), "stream aborted");
                break;
            }
        }
    }

    info!(device_id = %device_id, received, "device watch ended");
    Ok(())
}

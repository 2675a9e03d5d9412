use anyhow::{Context, Result};
use common::domain::{DeviceId, GpsLocation, Reading, Readings};
use event_hub::EventHub;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uplink_payload::CayenneLpp;

/// Configuration for the demo uplink producer
#[derive(Debug, Clone)]
pub struct DemoProducerConfig {
    pub device_id: DeviceId,
    pub interval_ms: u64,
}

/// Synthetic sensor frame for tick `counter`: temperature, humidity and a GPS fix
pub fn demo_payload(counter: u32) -> Result<Vec<u8>> {
    let step = f64::from(counter % 100);

    let mut readings = Readings::new();
    readings.insert(1, Reading::Temperature(18.0 + step / 10.0))?;
    readings.insert(2, Reading::Humidity(40.0 + (step % 20.0) / 2.0))?;
    readings.insert(
        3,
        Reading::Gps(GpsLocation {
            latitude: 52.3676,
            longitude: 4.9041,
            altitude: 2.0,
        }),
    )?;

    Ok(CayenneLpp::new().encode_payload(&readings)?)
}

/// Ingest a synthetic Cayenne LPP uplink for the demo device at a fixed interval
pub async fn run_demo_producer(
    hub: Arc<EventHub>,
    config: DemoProducerConfig,
    ctx: CancellationToken,
) -> Result<()> {
    info!(
        device_id = %config.device_id,
        interval_ms = config.interval_ms,
        "Starting demo uplink producer"
    );

    let mut ticker = interval(Duration::from_millis(config.interval_ms));
    let mut counter: u32 = 0;

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                info!(produced = counter, "demo uplink producer stopping");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let payload = demo_payload(counter).context("failed to build demo payload")?;
        let size_bytes = payload.len();

        match hub.ingest(config.device_id, &payload).await {
            Ok(event) => info!(
                device_id = %config.device_id,
                counter,
                size_bytes,
                readings = event.readings.len(),
                "ingested demo uplink"
            ),
            Err(e) => warn!(error = %e, counter, "demo uplink rejected"),
        }

        counter = counter.wrapping_add(1);
    }
}

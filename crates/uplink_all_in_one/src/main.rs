mod config;
mod demo_producer;
mod log_watcher;

use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use config::ServiceConfig;
use demo_producer::{run_demo_producer, DemoProducerConfig};
use event_hub::{EventHub, InMemoryCodecBindingStore};
use log_watcher::run_log_watcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uplink_payload::cayenne_lpp::CAYENNE_LPP;
use uplink_payload::CodecRegistry;
use uplink_runner::Runner;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (tracing + OpenTelemetry for traces and logs)
    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        "Starting uplink-all-in-one service"
    );
    debug!("Configuration: {:?}", config);

    let demo_device_id = match config.demo_device_id() {
        Ok(id) => id,
        Err(e) => {
            error!("Invalid demo device id: {}", e);
            std::process::exit(1);
        }
    };

    // Device to codec bindings normally come from the device registry
    let codec_bindings = Arc::new(InMemoryCodecBindingStore::new());
    codec_bindings.bind(demo_device_id, CAYENNE_LPP);

    let hub = Arc::new(EventHub::in_memory(
        CodecRegistry::with_builtin_codecs(),
        codec_bindings,
        config.event_hub_config(),
    ));

    let mut runner =
        Runner::new().with_named_process("retention_sweeper", hub.retention_sweeper_process());

    if config.demo_watcher_enabled {
        let hub = Arc::clone(&hub);
        runner = runner.with_named_process(
            "log_watcher",
            Box::new(move |ctx| Box::pin(run_log_watcher(hub, demo_device_id, ctx))),
        );
    }

    if config.demo_producer_enabled {
        let hub = Arc::clone(&hub);
        let producer_config = DemoProducerConfig {
            device_id: demo_device_id,
            interval_ms: config.demo_producer_interval_ms,
        };
        runner = runner.with_named_process(
            "demo_producer",
            Box::new(move |ctx| Box::pin(run_demo_producer(hub, producer_config, ctx))),
        );
    }

    runner = runner
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            // Flush pending traces and logs
            shutdown_telemetry(telemetry_providers);
            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(config.closer_timeout_secs));

    runner.run().await;
}

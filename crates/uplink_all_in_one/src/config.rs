use chrono::Duration as ChronoDuration;
use common::domain::{DeviceId, DomainError};
use common::telemetry::TelemetryConfig;
use config::{Config, Environment};
use event_hub::{BrokerConfig, EventHubConfig, RetentionPolicy, StreamingGatewayConfig};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    #[garde(length(min = 1))]
    pub log_level: String,

    // OpenTelemetry configuration
    /// Export traces and logs over OTLP
    #[serde(default = "default_otel_enabled")]
    #[garde(skip)]
    pub otel_enabled: bool,

    /// OTLP collector endpoint
    #[serde(default = "default_otel_endpoint")]
    #[garde(length(min = 1))]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    #[garde(length(min = 1))]
    pub otel_service_name: String,

    // Retention configuration
    /// Most events kept per device, 0 for no count limit
    #[serde(default = "default_retention_max_events")]
    #[garde(skip)]
    pub retention_max_events: usize,

    /// Oldest event age kept per device in seconds, 0 for no age limit
    #[serde(default = "default_retention_max_age_secs")]
    #[garde(skip)]
    pub retention_max_age_secs: u64,

    /// Events always kept per device regardless of age
    #[serde(default = "default_retention_min_events")]
    #[garde(skip)]
    pub retention_min_events: usize,

    #[serde(default = "default_retention_sweep_interval_secs")]
    #[garde(range(min = 1))]
    pub retention_sweep_interval_secs: u64,

    // Streaming configuration
    /// Events buffered per subscriber before overflow
    #[serde(default = "default_subscriber_buffer_capacity")]
    #[garde(range(min = 1))]
    pub subscriber_buffer_capacity: usize,

    /// Messages buffered per stream between delivery and transport
    #[serde(default = "default_stream_channel_capacity")]
    #[garde(range(min = 1))]
    pub stream_channel_capacity: usize,

    // Demo configuration
    #[serde(default = "default_demo_producer_enabled")]
    #[garde(skip)]
    pub demo_producer_enabled: bool,

    #[serde(default = "default_demo_producer_interval_ms")]
    #[garde(range(min = 10))]
    pub demo_producer_interval_ms: u64,

    /// Device the demo producer and watcher use, 16 hex characters
    #[serde(default = "default_demo_device_id")]
    #[garde(custom(is_device_id))]
    pub demo_device_id: String,

    #[serde(default = "default_demo_watcher_enabled")]
    #[garde(skip)]
    pub demo_watcher_enabled: bool,

    /// Time allowed for cleanup on shutdown in seconds
    #[serde(default = "default_closer_timeout_secs")]
    #[garde(range(min = 1))]
    pub closer_timeout_secs: u64,
}

fn is_device_id(value: &str, _context: &()) -> garde::Result {
    value
        .parse::<DeviceId>()
        .map(|_| ())
        .map_err(|e| garde::Error::new(e.to_string()))
}

fn default_log_level() -> String {
    "info".to_string()
}

// OpenTelemetry defaults
fn default_otel_enabled() -> bool {
    false
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "uplink-all-in-one".to_string()
}

// Retention defaults
fn default_retention_max_events() -> usize {
    10_000
}

fn default_retention_max_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_retention_min_events() -> usize {
    10
}

fn default_retention_sweep_interval_secs() -> u64 {
    60
}

// Streaming defaults
fn default_subscriber_buffer_capacity() -> usize {
    64
}

fn default_stream_channel_capacity() -> usize {
    32
}

// Demo defaults
fn default_demo_producer_enabled() -> bool {
    true
}

fn default_demo_producer_interval_ms() -> u64 {
    5000
}

fn default_demo_device_id() -> String {
    "0102030405060708".to_string()
}

fn default_demo_watcher_enabled() -> bool {
    true
}

fn default_closer_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("UPLINK"))
            .build()?
            .try_deserialize()?;
        common::garde::validate_struct(&config)?;
        Ok(config)
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }

    pub fn event_hub_config(&self) -> EventHubConfig {
        EventHubConfig {
            retention: RetentionPolicy {
                max_events: (self.retention_max_events > 0).then_some(self.retention_max_events),
                max_age: i64::try_from(self.retention_max_age_secs)
                    .ok()
                    .filter(|secs| *secs > 0)
                    .and_then(ChronoDuration::try_seconds),
                min_events: self.retention_min_events,
            },
            retention_sweep_interval: Duration::from_secs(self.retention_sweep_interval_secs),
            broker: BrokerConfig {
                subscriber_buffer_capacity: self.subscriber_buffer_capacity,
            },
            streaming: StreamingGatewayConfig {
                channel_capacity: self.stream_channel_capacity,
            },
        }
    }

    pub fn demo_device_id(&self) -> Result<DeviceId, DomainError> {
        self.demo_device_id.parse()
    }
}

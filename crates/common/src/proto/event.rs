use crate::domain::{DeviceId, Event, Readings};
use crate::proto::value::{
    datetime_to_timestamp, json_map_to_struct, struct_to_json_map, timestamp_to_datetime,
};
use anyhow::{anyhow, Context, Result};
use prost_types::{Struct, Timestamp};

/// Event type tag carried by every uplink event on the wire.
pub const UPLINK_EVENT_TYPE: &str = "up";

/// Wire form of a decoded uplink event.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceEvent {
    /// Device identifier as 16 lowercase hex characters
    #[prost(string, tag = "1")]
    pub device_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub event_type: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub received_at: ::core::option::Option<Timestamp>,
    #[prost(message, optional, tag = "4")]
    pub readings: ::core::option::Option<Struct>,
}

/// Notice that events were dropped for a slow subscriber.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Overflow {
    #[prost(uint64, tag = "1")]
    pub dropped: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamDeviceEventsRequest {
    #[prost(string, tag = "1")]
    pub device_id: ::prost::alloc::string::String,
}

/// One message of a device event stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamDeviceEventsResponse {
    #[prost(oneof = "stream_device_events_response::Kind", tags = "1, 2")]
    pub kind: ::core::option::Option<stream_device_events_response::Kind>,
}

pub mod stream_device_events_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        Event(super::DeviceEvent),
        #[prost(message, tag = "2")]
        Overflow(super::Overflow),
    }
}

impl StreamDeviceEventsResponse {
    pub fn event(event: DeviceEvent) -> Self {
        Self {
            kind: Some(stream_device_events_response::Kind::Event(event)),
        }
    }

    pub fn overflow(dropped: u64) -> Self {
        Self {
            kind: Some(stream_device_events_response::Kind::Overflow(Overflow {
                dropped,
            })),
        }
    }
}

/// Convert domain Event to protobuf DeviceEvent
pub fn event_domain_to_proto(event: &Event) -> Result<DeviceEvent> {
    let readings = match serde_json::to_value(&event.readings)
        .context("Failed to serialize readings")?
    {
        serde_json::Value::Object(map) => json_map_to_struct(&map),
        other => return Err(anyhow!("Readings serialized to non-object JSON: {}", other)),
    };

    Ok(DeviceEvent {
        device_id: event.device_id.to_hex(),
        event_type: UPLINK_EVENT_TYPE.to_string(),
        received_at: Some(datetime_to_timestamp(&event.received_at)),
        readings: Some(readings),
    })
}

/// Convert protobuf DeviceEvent to domain Event
pub fn event_proto_to_domain(proto: DeviceEvent) -> Result<Event> {
    let device_id: DeviceId = proto.device_id.parse()?;

    let received_at = timestamp_to_datetime(
        proto
            .received_at
            .as_ref()
            .ok_or_else(|| anyhow!("Missing received_at timestamp"))?,
    )?;

    let readings = match proto.readings {
        Some(s) => serde_json::from_value::<Readings>(serde_json::Value::Object(
            struct_to_json_map(&s),
        ))
        .context("Failed to deserialize readings")?,
        None => Readings::new(),
    };

    Ok(Event {
        device_id,
        received_at,
        readings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GpsLocation, Reading};
    use chrono::{TimeZone, Utc};
    use prost::Message;

    fn sample_event() -> Event {
        let mut readings = Readings::new();
        readings.insert(1, Reading::Temperature(20.0)).unwrap();
        readings.insert(2, Reading::Humidity(65.5)).unwrap();
        readings.insert(3, Reading::DigitalInput(1)).unwrap();
        readings
            .insert(
                4,
                Reading::Gps(GpsLocation {
                    latitude: 52.3655,
                    longitude: 4.8885,
                    altitude: 21.54,
                }),
            )
            .unwrap();

        Event {
            device_id: DeviceId::new([8, 7, 6, 5, 4, 3, 2, 1]),
            received_at: Utc.timestamp_opt(1_700_000_000, 500).unwrap(),
            readings,
        }
    }

    #[test]
    fn test_domain_to_proto() {
        let proto = event_domain_to_proto(&sample_event()).unwrap();

        assert_eq!(proto.device_id, "0807060504030201");
        assert_eq!(proto.event_type, "up");
        assert_eq!(proto.received_at.unwrap().seconds, 1_700_000_000);

        let readings = proto.readings.unwrap();
        assert!(readings.fields.contains_key("temperatureSensor"));
        assert!(readings.fields.contains_key("gpsLocation"));
        assert!(!readings.fields.contains_key("voltage"));
    }

    #[test]
    fn test_proto_back_to_domain() {
        let event = sample_event();
        let proto = event_domain_to_proto(&event).unwrap();

        let back = event_proto_to_domain(proto).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_missing_timestamp_error() {
        let proto = DeviceEvent {
            device_id: "0102030405060708".to_string(),
            event_type: UPLINK_EVENT_TYPE.to_string(),
            received_at: None,
            readings: None,
        };

        let result = event_proto_to_domain(proto);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Missing received_at"));
    }

    #[test]
    fn test_invalid_device_id_error() {
        let proto = DeviceEvent {
            device_id: "not-a-device".to_string(),
            event_type: UPLINK_EVENT_TYPE.to_string(),
            received_at: Some(Timestamp {
                seconds: 1,
                nanos: 0,
            }),
            readings: None,
        };

        assert!(event_proto_to_domain(proto).is_err());
    }

    #[test]
    fn test_stream_response_encodes_on_the_wire() {
        let response = StreamDeviceEventsResponse::overflow(3);
        let bytes = response.encode_to_vec();

        let decoded = StreamDeviceEventsResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(
            decoded.kind,
            Some(stream_device_events_response::Kind::Overflow(Overflow {
                dropped: 3
            }))
        );
    }
}

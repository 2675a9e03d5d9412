use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use prost_types::{value::Kind, ListValue, Struct, Timestamp, Value};

/// Convert chrono DateTime to protobuf Timestamp
pub fn datetime_to_timestamp(dt: &DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

/// Convert protobuf Timestamp to chrono DateTime
pub fn timestamp_to_datetime(ts: &Timestamp) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(ts.seconds, ts.nanos as u32)
        .single()
        .ok_or_else(|| {
            anyhow!(
                "Invalid timestamp: {} seconds, {} nanos",
                ts.seconds,
                ts.nanos
            )
        })
}

/// Convert a JSON object into a protobuf Struct
pub fn json_map_to_struct(map: &serde_json::Map<String, serde_json::Value>) -> Struct {
    Struct {
        fields: map
            .iter()
            .map(|(k, v)| (k.clone(), json_to_prost_value(v)))
            .collect(),
    }
}

/// Convert a protobuf Struct into a JSON object
pub fn struct_to_json_map(s: &Struct) -> serde_json::Map<String, serde_json::Value> {
    s.fields
        .iter()
        .filter_map(|(k, v)| prost_value_to_json(v).map(|json| (k.clone(), json)))
        .collect()
}

/// Convert serde_json::Value to protobuf Value
pub fn json_to_prost_value(value: &serde_json::Value) -> Value {
    let kind = match value {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(b) => Kind::BoolValue(*b),
        serde_json::Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Kind::StringValue(s.clone()),
        serde_json::Value::Array(values) => Kind::ListValue(ListValue {
            values: values.iter().map(json_to_prost_value).collect(),
        }),
        serde_json::Value::Object(map) => Kind::StructValue(json_map_to_struct(map)),
    };
    Value { kind: Some(kind) }
}

/// Convert protobuf Value to serde_json::Value
///
/// Protobuf carries every number as a double; integral values come back as
/// JSON integers so they deserialize into integer fields again.
pub fn prost_value_to_json(value: &Value) -> Option<serde_json::Value> {
    value.kind.as_ref().map(|kind| match kind {
        Kind::NullValue(_) => serde_json::Value::Null,
        Kind::NumberValue(n) => number_to_json(*n),
        Kind::StringValue(s) => serde_json::Value::String(s.clone()),
        Kind::BoolValue(b) => serde_json::Value::Bool(*b),
        Kind::StructValue(s) => serde_json::Value::Object(struct_to_json_map(s)),
        Kind::ListValue(list) => {
            serde_json::Value::Array(list.values.iter().filter_map(prost_value_to_json).collect())
        }
    })
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        serde_json::json!(n as i64)
    } else {
        serde_json::json!(n)
    }
}

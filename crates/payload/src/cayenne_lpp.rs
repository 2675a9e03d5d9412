use crate::{PayloadError, Result};
use common::{
    Accelerometer, Codec, DomainError, DomainResult, GpsLocation, Gyrometer, Reading, Readings,
};

/// Name the codec is registered and bound under.
pub const CAYENNE_LPP: &str = "cayenne_lpp";

// Sensor type IDs from Cayenne LPP specification
pub const TYPE_DIGITAL_INPUT: u8 = 0;
pub const TYPE_DIGITAL_OUTPUT: u8 = 1;
pub const TYPE_ANALOG_INPUT: u8 = 2;
pub const TYPE_ANALOG_OUTPUT: u8 = 3;
pub const TYPE_ILLUMINANCE: u8 = 101;
pub const TYPE_PRESENCE: u8 = 102;
pub const TYPE_TEMPERATURE: u8 = 103;
pub const TYPE_HUMIDITY: u8 = 104;
pub const TYPE_ACCELEROMETER: u8 = 113;
pub const TYPE_BAROMETER: u8 = 115;
pub const TYPE_VOLTAGE: u8 = 116;
pub const TYPE_CURRENT: u8 = 117;
pub const TYPE_FREQUENCY: u8 = 118;
pub const TYPE_ENERGY: u8 = 131;
pub const TYPE_GYROMETER: u8 = 134;
pub const TYPE_GPS: u8 = 136;

// Data sizes for each type (in bytes, excluding channel and type bytes)
pub const SIZE_DIGITAL: usize = 1;
pub const SIZE_ANALOG: usize = 2;
pub const SIZE_ILLUMINANCE: usize = 2;
pub const SIZE_PRESENCE: usize = 1;
pub const SIZE_TEMPERATURE: usize = 2;
pub const SIZE_HUMIDITY: usize = 1;
pub const SIZE_ACCELEROMETER: usize = 6;
pub const SIZE_BAROMETER: usize = 2;
pub const SIZE_VOLTAGE: usize = 2;
pub const SIZE_CURRENT: usize = 2;
pub const SIZE_FREQUENCY: usize = 4;
pub const SIZE_ENERGY: usize = 4;
pub const SIZE_GYROMETER: usize = 6;
pub const SIZE_GPS: usize = 9;

// Fixed-point scale factors (wire value = reading * scale)
const SCALE_ANALOG: f64 = 100.0;
const SCALE_TEMPERATURE: f64 = 10.0;
const SCALE_HUMIDITY: f64 = 2.0;
const SCALE_ACCELEROMETER: f64 = 1000.0;
const SCALE_BAROMETER: f64 = 10.0;
const SCALE_GYROMETER: f64 = 100.0;
const SCALE_GPS_COORDINATE: f64 = 10000.0;
const SCALE_GPS_ALTITUDE: f64 = 100.0;
const SCALE_VOLTAGE: f64 = 100.0;
const SCALE_CURRENT: f64 = 1000.0;
const SCALE_FREQUENCY: f64 = 1.0;
const SCALE_ENERGY: f64 = 1000.0;

const I24_MIN: i32 = -(1 << 23);
const I24_MAX: i32 = (1 << 23) - 1;

/// Cayenne Low Power Payload codec.
///
/// A payload is a sequence of `channel | type | value` records with a
/// type-specific fixed value width, all multi-byte values big-endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct CayenneLpp;

impl CayenneLpp {
    pub fn new() -> Self {
        Self
    }

    fn get_data_size(type_id: u8) -> Option<usize> {
        match type_id {
            TYPE_DIGITAL_INPUT | TYPE_DIGITAL_OUTPUT => Some(SIZE_DIGITAL),
            TYPE_ANALOG_INPUT | TYPE_ANALOG_OUTPUT => Some(SIZE_ANALOG),
            TYPE_ILLUMINANCE => Some(SIZE_ILLUMINANCE),
            TYPE_PRESENCE => Some(SIZE_PRESENCE),
            TYPE_TEMPERATURE => Some(SIZE_TEMPERATURE),
            TYPE_HUMIDITY => Some(SIZE_HUMIDITY),
            TYPE_ACCELEROMETER => Some(SIZE_ACCELEROMETER),
            TYPE_BAROMETER => Some(SIZE_BAROMETER),
            TYPE_VOLTAGE => Some(SIZE_VOLTAGE),
            TYPE_CURRENT => Some(SIZE_CURRENT),
            TYPE_FREQUENCY => Some(SIZE_FREQUENCY),
            TYPE_ENERGY => Some(SIZE_ENERGY),
            TYPE_GYROMETER => Some(SIZE_GYROMETER),
            TYPE_GPS => Some(SIZE_GPS),
            _ => None,
        }
    }

    /// Decode a payload into readings, failing on the first bad record.
    pub fn decode_payload(&self, bytes: &[u8]) -> Result<Readings> {
        let mut readings = Readings::new();
        let mut offset = 0;

        while offset < bytes.len() {
            // Need at least 2 bytes for channel + type
            if offset + 2 > bytes.len() {
                return Err(PayloadError::InsufficientData {
                    offset,
                    expected: 2,
                    actual: bytes.len() - offset,
                });
            }

            let channel = bytes[offset];
            let type_id = bytes[offset + 1];
            offset += 2;

            let data_size = Self::get_data_size(type_id)
                .ok_or(PayloadError::UnsupportedType { channel, type_id })?;

            if offset + data_size > bytes.len() {
                return Err(PayloadError::InsufficientData {
                    offset,
                    expected: data_size,
                    actual: bytes.len() - offset,
                });
            }

            let reading = decode_value(channel, type_id, &bytes[offset..offset + data_size])?;
            offset += data_size;

            readings.insert(channel, reading)?;
        }

        Ok(readings)
    }

    /// Encode readings, one record per channel, kinds in a fixed order and
    /// channels ascending within a kind.
    pub fn encode_payload(&self, readings: &Readings) -> Result<Vec<u8>> {
        readings.check_channels()?;

        let mut out = Vec::with_capacity(readings.len() * 4);
        for (channel, reading) in readings.iter() {
            encode_record(&mut out, channel, &reading);
        }
        Ok(out)
    }
}

impl Codec for CayenneLpp {
    fn name(&self) -> &str {
        CAYENNE_LPP
    }

    fn decode(&self, payload: &[u8]) -> DomainResult<Readings> {
        Ok(self.decode_payload(payload)?)
    }

    fn encode(&self, readings: &Readings) -> DomainResult<Vec<u8>> {
        self.encode_payload(readings).map_err(|e| match e {
            PayloadError::ChannelConflict(conflict) => {
                DomainError::ValidationError(conflict.to_string())
            }
            other => other.into(),
        })
    }
}

fn decode_value(channel: u8, type_id: u8, data: &[u8]) -> Result<Reading> {
    let reading = match type_id {
        TYPE_DIGITAL_INPUT => Reading::DigitalInput(data[0]),
        TYPE_DIGITAL_OUTPUT => Reading::DigitalOutput(data[0]),
        TYPE_ANALOG_INPUT => Reading::AnalogInput(read_i16_be(data) as f64 / SCALE_ANALOG),
        TYPE_ANALOG_OUTPUT => Reading::AnalogOutput(read_i16_be(data) as f64 / SCALE_ANALOG),
        TYPE_ILLUMINANCE => Reading::Illuminance(read_u16_be(data)),
        TYPE_PRESENCE => Reading::Presence(data[0]),
        TYPE_TEMPERATURE => {
            Reading::Temperature(read_i16_be(data) as f64 / SCALE_TEMPERATURE)
        }
        TYPE_HUMIDITY => Reading::Humidity(data[0] as f64 / SCALE_HUMIDITY),
        TYPE_ACCELEROMETER => Reading::Accelerometer(Accelerometer {
            x: read_i16_be(&data[0..2]) as f64 / SCALE_ACCELEROMETER,
            y: read_i16_be(&data[2..4]) as f64 / SCALE_ACCELEROMETER,
            z: read_i16_be(&data[4..6]) as f64 / SCALE_ACCELEROMETER,
        }),
        TYPE_BAROMETER => Reading::Barometer(read_u16_be(data) as f64 / SCALE_BAROMETER),
        TYPE_VOLTAGE => Reading::Voltage(read_u16_be(data) as f64 / SCALE_VOLTAGE),
        TYPE_CURRENT => Reading::Current(read_u16_be(data) as f64 / SCALE_CURRENT),
        TYPE_FREQUENCY => Reading::Frequency(read_u32_be(data) as f64 / SCALE_FREQUENCY),
        TYPE_ENERGY => Reading::Energy(read_u32_be(data) as f64 / SCALE_ENERGY),
        TYPE_GYROMETER => Reading::Gyrometer(Gyrometer {
            x: read_i16_be(&data[0..2]) as f64 / SCALE_GYROMETER,
            y: read_i16_be(&data[2..4]) as f64 / SCALE_GYROMETER,
            z: read_i16_be(&data[4..6]) as f64 / SCALE_GYROMETER,
        }),
        TYPE_GPS => Reading::Gps(GpsLocation {
            latitude: read_i24_be(&data[0..3]) as f64 / SCALE_GPS_COORDINATE,
            longitude: read_i24_be(&data[3..6]) as f64 / SCALE_GPS_COORDINATE,
            altitude: read_i24_be(&data[6..9]) as f64 / SCALE_GPS_ALTITUDE,
        }),
        _ => return Err(PayloadError::UnsupportedType { channel, type_id }),
    };
    Ok(reading)
}

fn encode_record(out: &mut Vec<u8>, channel: u8, reading: &Reading) {
    out.push(channel);
    match *reading {
        Reading::DigitalInput(v) => {
            out.extend_from_slice(&[TYPE_DIGITAL_INPUT, v]);
        }
        Reading::DigitalOutput(v) => {
            out.extend_from_slice(&[TYPE_DIGITAL_OUTPUT, v]);
        }
        Reading::AnalogInput(v) => {
            out.push(TYPE_ANALOG_INPUT);
            out.extend_from_slice(&quantize_i16(v, SCALE_ANALOG).to_be_bytes());
        }
        Reading::AnalogOutput(v) => {
            out.push(TYPE_ANALOG_OUTPUT);
            out.extend_from_slice(&quantize_i16(v, SCALE_ANALOG).to_be_bytes());
        }
        Reading::Illuminance(v) => {
            out.push(TYPE_ILLUMINANCE);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Reading::Presence(v) => {
            out.extend_from_slice(&[TYPE_PRESENCE, v]);
        }
        Reading::Temperature(v) => {
            out.push(TYPE_TEMPERATURE);
            out.extend_from_slice(&quantize_i16(v, SCALE_TEMPERATURE).to_be_bytes());
        }
        Reading::Humidity(v) => {
            out.extend_from_slice(&[TYPE_HUMIDITY, quantize_u8(v, SCALE_HUMIDITY)]);
        }
        Reading::Accelerometer(a) => {
            out.push(TYPE_ACCELEROMETER);
            for axis in [a.x, a.y, a.z] {
                out.extend_from_slice(&quantize_i16(axis, SCALE_ACCELEROMETER).to_be_bytes());
            }
        }
        Reading::Barometer(v) => {
            out.push(TYPE_BAROMETER);
            out.extend_from_slice(&quantize_u16(v, SCALE_BAROMETER).to_be_bytes());
        }
        Reading::Voltage(v) => {
            out.push(TYPE_VOLTAGE);
            out.extend_from_slice(&quantize_u16(v, SCALE_VOLTAGE).to_be_bytes());
        }
        Reading::Current(v) => {
            out.push(TYPE_CURRENT);
            out.extend_from_slice(&quantize_u16(v, SCALE_CURRENT).to_be_bytes());
        }
        Reading::Frequency(v) => {
            out.push(TYPE_FREQUENCY);
            out.extend_from_slice(&quantize_u32(v, SCALE_FREQUENCY).to_be_bytes());
        }
        Reading::Energy(v) => {
            out.push(TYPE_ENERGY);
            out.extend_from_slice(&quantize_u32(v, SCALE_ENERGY).to_be_bytes());
        }
        Reading::Gyrometer(g) => {
            out.push(TYPE_GYROMETER);
            for axis in [g.x, g.y, g.z] {
                out.extend_from_slice(&quantize_i16(axis, SCALE_GYROMETER).to_be_bytes());
            }
        }
        Reading::Gps(gps) => {
            out.push(TYPE_GPS);
            write_i24_be(out, quantize_i24(gps.latitude, SCALE_GPS_COORDINATE));
            write_i24_be(out, quantize_i24(gps.longitude, SCALE_GPS_COORDINATE));
            write_i24_be(out, quantize_i24(gps.altitude, SCALE_GPS_ALTITUDE));
        }
    }
}

fn read_i16_be(data: &[u8]) -> i16 {
    i16::from_be_bytes([data[0], data[1]])
}

fn read_u16_be(data: &[u8]) -> u16 {
    u16::from_be_bytes([data[0], data[1]])
}

fn read_u32_be(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

fn read_i24_be(data: &[u8]) -> i32 {
    // Sign-extend 24-bit to 32-bit
    let value =
        (i32::from(data[0]) << 24) | (i32::from(data[1]) << 16) | (i32::from(data[2]) << 8);
    value >> 8
}

fn write_i24_be(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes()[1..4]);
}

// Float-to-int `as` casts saturate at the target bounds and map NaN to 0,
// so every reading encodes to some in-range wire value.
fn quantize_i16(value: f64, scale: f64) -> i16 {
    (value * scale).round() as i16
}

fn quantize_u8(value: f64, scale: f64) -> u8 {
    (value * scale).round() as u8
}

fn quantize_u16(value: f64, scale: f64) -> u16 {
    (value * scale).round() as u16
}

fn quantize_u32(value: f64, scale: f64) -> u32 {
    (value * scale).round() as u32
}

fn quantize_i24(value: f64, scale: f64) -> i32 {
    ((value * scale).round() as i32).clamp(I24_MIN, I24_MAX)
}

//! Typed sensor readings decoded from an uplink payload.
//!
//! A [`Readings`] value holds one channel map per measurement kind. The set of
//! kinds is closed; a channel number belongs to at most one kind within a
//! single set of readings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Accelerometer {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Gyrometer {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GpsLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Measurement kinds a channel can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorKind {
    DigitalInput,
    DigitalOutput,
    AnalogInput,
    AnalogOutput,
    Illuminance,
    Presence,
    Temperature,
    Humidity,
    Accelerometer,
    Barometer,
    Gyrometer,
    Gps,
    Voltage,
    Current,
    Frequency,
    Energy,
}

impl SensorKind {
    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::DigitalInput => "digital_input",
            SensorKind::DigitalOutput => "digital_output",
            SensorKind::AnalogInput => "analog_input",
            SensorKind::AnalogOutput => "analog_output",
            SensorKind::Illuminance => "illuminance",
            SensorKind::Presence => "presence",
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Accelerometer => "accelerometer",
            SensorKind::Barometer => "barometer",
            SensorKind::Gyrometer => "gyrometer",
            SensorKind::Gps => "gps",
            SensorKind::Voltage => "voltage",
            SensorKind::Current => "current",
            SensorKind::Frequency => "frequency",
            SensorKind::Energy => "energy",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single measurement on one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    DigitalInput(u8),
    DigitalOutput(u8),
    AnalogInput(f64),
    AnalogOutput(f64),
    Illuminance(u16),
    Presence(u8),
    Temperature(f64),
    Humidity(f64),
    Accelerometer(Accelerometer),
    Barometer(f64),
    Gyrometer(Gyrometer),
    Gps(GpsLocation),
    Voltage(f64),
    Current(f64),
    Frequency(f64),
    Energy(f64),
}

impl Reading {
    pub fn kind(&self) -> SensorKind {
        match self {
            Reading::DigitalInput(_) => SensorKind::DigitalInput,
            Reading::DigitalOutput(_) => SensorKind::DigitalOutput,
            Reading::AnalogInput(_) => SensorKind::AnalogInput,
            Reading::AnalogOutput(_) => SensorKind::AnalogOutput,
            Reading::Illuminance(_) => SensorKind::Illuminance,
            Reading::Presence(_) => SensorKind::Presence,
            Reading::Temperature(_) => SensorKind::Temperature,
            Reading::Humidity(_) => SensorKind::Humidity,
            Reading::Accelerometer(_) => SensorKind::Accelerometer,
            Reading::Barometer(_) => SensorKind::Barometer,
            Reading::Gyrometer(_) => SensorKind::Gyrometer,
            Reading::Gps(_) => SensorKind::Gps,
            Reading::Voltage(_) => SensorKind::Voltage,
            Reading::Current(_) => SensorKind::Current,
            Reading::Frequency(_) => SensorKind::Frequency,
            Reading::Energy(_) => SensorKind::Energy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("channel {channel} already carries {existing}, cannot also carry {incoming}")]
pub struct ChannelConflict {
    pub channel: u8,
    pub existing: SensorKind,
    pub incoming: SensorKind,
}

/// Channel maps per measurement kind.
///
/// Serialized with camelCase field names; kinds without any channel are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readings {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub digital_input: BTreeMap<u8, u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub digital_output: BTreeMap<u8, u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub analog_input: BTreeMap<u8, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub analog_output: BTreeMap<u8, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub illuminance_sensor: BTreeMap<u8, u16>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub presence_sensor: BTreeMap<u8, u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub temperature_sensor: BTreeMap<u8, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub humidity_sensor: BTreeMap<u8, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub accelerometer: BTreeMap<u8, Accelerometer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub barometer: BTreeMap<u8, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gyrometer: BTreeMap<u8, Gyrometer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gps_location: BTreeMap<u8, GpsLocation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub voltage: BTreeMap<u8, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub current: BTreeMap<u8, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub frequency: BTreeMap<u8, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub energy: BTreeMap<u8, f64>,
}

impl Readings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reading, replacing any previous value of the same kind on that channel.
    ///
    /// Fails when the channel is already used by a different kind.
    pub fn insert(&mut self, channel: u8, reading: Reading) -> Result<(), ChannelConflict> {
        if let Some(existing) = self.kind_of(channel) {
            if existing != reading.kind() {
                return Err(ChannelConflict {
                    channel,
                    existing,
                    incoming: reading.kind(),
                });
            }
        }

        match reading {
            Reading::DigitalInput(v) => {
                self.digital_input.insert(channel, v);
            }
            Reading::DigitalOutput(v) => {
                self.digital_output.insert(channel, v);
            }
            Reading::AnalogInput(v) => {
                self.analog_input.insert(channel, v);
            }
            Reading::AnalogOutput(v) => {
                self.analog_output.insert(channel, v);
            }
            Reading::Illuminance(v) => {
                self.illuminance_sensor.insert(channel, v);
            }
            Reading::Presence(v) => {
                self.presence_sensor.insert(channel, v);
            }
            Reading::Temperature(v) => {
                self.temperature_sensor.insert(channel, v);
            }
            Reading::Humidity(v) => {
                self.humidity_sensor.insert(channel, v);
            }
            Reading::Accelerometer(v) => {
                self.accelerometer.insert(channel, v);
            }
            Reading::Barometer(v) => {
                self.barometer.insert(channel, v);
            }
            Reading::Gyrometer(v) => {
                self.gyrometer.insert(channel, v);
            }
            Reading::Gps(v) => {
                self.gps_location.insert(channel, v);
            }
            Reading::Voltage(v) => {
                self.voltage.insert(channel, v);
            }
            Reading::Current(v) => {
                self.current.insert(channel, v);
            }
            Reading::Frequency(v) => {
                self.frequency.insert(channel, v);
            }
            Reading::Energy(v) => {
                self.energy.insert(channel, v);
            }
        }
        Ok(())
    }

    /// Kind currently carried by `channel`, if any.
    pub fn kind_of(&self, channel: u8) -> Option<SensorKind> {
        self.iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, reading)| reading.kind())
    }

    /// All readings, grouped by kind and in ascending channel order within a kind.
    pub fn iter(&self) -> impl Iterator<Item = (u8, Reading)> + '_ {
        let digital_input = self
            .digital_input
            .iter()
            .map(|(c, v)| (*c, Reading::DigitalInput(*v)));
        let digital_output = self
            .digital_output
            .iter()
            .map(|(c, v)| (*c, Reading::DigitalOutput(*v)));
        let analog_input = self
            .analog_input
            .iter()
            .map(|(c, v)| (*c, Reading::AnalogInput(*v)));
        let analog_output = self
            .analog_output
            .iter()
            .map(|(c, v)| (*c, Reading::AnalogOutput(*v)));
        let illuminance = self
            .illuminance_sensor
            .iter()
            .map(|(c, v)| (*c, Reading::Illuminance(*v)));
        let presence = self
            .presence_sensor
            .iter()
            .map(|(c, v)| (*c, Reading::Presence(*v)));
        let temperature = self
            .temperature_sensor
            .iter()
            .map(|(c, v)| (*c, Reading::Temperature(*v)));
        let humidity = self
            .humidity_sensor
            .iter()
            .map(|(c, v)| (*c, Reading::Humidity(*v)));
        let accelerometer = self
            .accelerometer
            .iter()
            .map(|(c, v)| (*c, Reading::Accelerometer(*v)));
        let barometer = self
            .barometer
            .iter()
            .map(|(c, v)| (*c, Reading::Barometer(*v)));
        let gyrometer = self
            .gyrometer
            .iter()
            .map(|(c, v)| (*c, Reading::Gyrometer(*v)));
        let gps = self
            .gps_location
            .iter()
            .map(|(c, v)| (*c, Reading::Gps(*v)));
        let voltage = self.voltage.iter().map(|(c, v)| (*c, Reading::Voltage(*v)));
        let current = self.current.iter().map(|(c, v)| (*c, Reading::Current(*v)));
        let frequency = self
            .frequency
            .iter()
            .map(|(c, v)| (*c, Reading::Frequency(*v)));
        let energy = self.energy.iter().map(|(c, v)| (*c, Reading::Energy(*v)));

        digital_input
            .chain(digital_output)
            .chain(analog_input)
            .chain(analog_output)
            .chain(illuminance)
            .chain(presence)
            .chain(temperature)
            .chain(humidity)
            .chain(accelerometer)
            .chain(barometer)
            .chain(gyrometer)
            .chain(gps)
            .chain(voltage)
            .chain(current)
            .chain(frequency)
            .chain(energy)
    }

    /// Total number of channel readings across all kinds.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Check that no channel is shared between two kinds.
    ///
    /// Values built through [`Readings::insert`] always pass; values built by
    /// writing the public maps directly (or deserialized) may not.
    pub fn check_channels(&self) -> Result<(), ChannelConflict> {
        let mut seen: BTreeMap<u8, SensorKind> = BTreeMap::new();
        for (channel, reading) in self.iter() {
            if let Some(existing) = seen.insert(channel, reading.kind()) {
                return Err(ChannelConflict {
                    channel,
                    existing,
                    incoming: reading.kind(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_readings() {
        let readings = Readings::new();
        assert!(readings.is_empty());
        assert_eq!(readings.len(), 0);
        assert_eq!(serde_json::to_value(&readings).unwrap(), json!({}));
    }

    #[test]
    fn test_insert_multiple_channels_same_kind() {
        let mut readings = Readings::new();
        readings.insert(5, Reading::Temperature(-0.1)).unwrap();
        readings.insert(3, Reading::Temperature(27.2)).unwrap();

        assert_eq!(readings.len(), 2);
        let channels: Vec<u8> = readings.iter().map(|(c, _)| c).collect();
        assert_eq!(channels, vec![3, 5]);
    }

    #[test]
    fn test_insert_same_kind_replaces_value() {
        let mut readings = Readings::new();
        readings.insert(1, Reading::Humidity(40.0)).unwrap();
        readings.insert(1, Reading::Humidity(55.5)).unwrap();

        assert_eq!(readings.humidity_sensor.get(&1), Some(&55.5));
        assert_eq!(readings.len(), 1);
    }

    #[test]
    fn test_insert_conflicting_kind_rejected() {
        let mut readings = Readings::new();
        readings.insert(1, Reading::Temperature(20.0)).unwrap();

        let err = readings.insert(1, Reading::Humidity(50.0)).unwrap_err();
        assert_eq!(err.channel, 1);
        assert_eq!(err.existing, SensorKind::Temperature);
        assert_eq!(err.incoming, SensorKind::Humidity);
        assert!(readings.humidity_sensor.is_empty());
    }

    #[test]
    fn test_check_channels_detects_direct_map_writes() {
        let mut readings = Readings::new();
        readings.voltage.insert(2, 3.3);
        readings.current.insert(2, 0.5);

        assert!(readings.check_channels().is_err());
    }

    #[test]
    fn test_kind_of() {
        let mut readings = Readings::new();
        readings
            .insert(
                9,
                Reading::Gps(GpsLocation {
                    latitude: 42.3519,
                    longitude: -87.9094,
                    altitude: 10.0,
                }),
            )
            .unwrap();

        assert_eq!(readings.kind_of(9), Some(SensorKind::Gps));
        assert_eq!(readings.kind_of(8), None);
    }

    #[test]
    fn test_json_uses_camel_case_kind_names() {
        let mut readings = Readings::new();
        readings.insert(1, Reading::Temperature(20.0)).unwrap();
        readings
            .insert(
                2,
                Reading::Accelerometer(Accelerometer {
                    x: 0.5,
                    y: 0.0,
                    z: -1.0,
                }),
            )
            .unwrap();

        let value = serde_json::to_value(&readings).unwrap();
        assert_eq!(
            value,
            json!({
                "temperatureSensor": {"1": 20.0},
                "accelerometer": {"2": {"x": 0.5, "y": 0.0, "z": -1.0}}
            })
        );

        let back: Readings = serde_json::from_value(value).unwrap();
        assert_eq!(back, readings);
    }
}

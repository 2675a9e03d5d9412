use common::{Accelerometer, Codec, GpsLocation, Gyrometer, Reading, Readings};
use uplink_payload::cayenne_lpp::CAYENNE_LPP;
use uplink_payload::{CayenneLpp, CodecRegistry};

/// Largest rounding error for a value with the given wire scale
fn half_step(scale: f64) -> f64 {
    0.5 / scale + 1e-9
}

fn assert_close(actual: f64, expected: f64, scale: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= half_step(scale),
        "{}: decoded {} differs from {} by more than the format resolution",
        what,
        actual,
        expected
    );
}

fn sensor_suite() -> Readings {
    let mut readings = Readings::new();
    readings.insert(0, Reading::DigitalInput(1)).unwrap();
    readings.insert(1, Reading::DigitalOutput(0)).unwrap();
    readings.insert(2, Reading::AnalogInput(-2.754)).unwrap();
    readings.insert(3, Reading::AnalogOutput(12.349)).unwrap();
    readings.insert(4, Reading::Illuminance(1000)).unwrap();
    readings.insert(5, Reading::Presence(1)).unwrap();
    readings.insert(6, Reading::Temperature(21.37)).unwrap();
    readings.insert(7, Reading::Humidity(47.3)).unwrap();
    readings
        .insert(
            8,
            Reading::Accelerometer(Accelerometer {
                x: -0.5004,
                y: 0.0,
                z: 0.9812,
            }),
        )
        .unwrap();
    readings.insert(9, Reading::Barometer(1013.26)).unwrap();
    readings
        .insert(
            10,
            Reading::Gyrometer(Gyrometer {
                x: 1.234,
                y: -5.678,
                z: 0.0,
            }),
        )
        .unwrap();
    readings
        .insert(
            11,
            Reading::Gps(GpsLocation {
                latitude: 52.36551,
                longitude: -4.88852,
                altitude: 21.543,
            }),
        )
        .unwrap();
    readings.insert(12, Reading::Voltage(3.304)).unwrap();
    readings.insert(13, Reading::Current(0.1234)).unwrap();
    readings.insert(14, Reading::Frequency(50.2)).unwrap();
    readings.insert(15, Reading::Energy(1.0005)).unwrap();
    readings
}

#[test]
fn test_every_kind_survives_round_trip_within_resolution() {
    let codec = CayenneLpp::new();
    let original = sensor_suite();

    let bytes = codec.encode(&original).unwrap();
    let decoded = codec.decode(&bytes).unwrap();

    assert_eq!(decoded.len(), original.len());
    assert_eq!(decoded.digital_input, original.digital_input);
    assert_eq!(decoded.digital_output, original.digital_output);
    assert_eq!(decoded.illuminance_sensor, original.illuminance_sensor);
    assert_eq!(decoded.presence_sensor, original.presence_sensor);

    assert_close(decoded.analog_input[&2], -2.754, 100.0, "analog input");
    assert_close(decoded.analog_output[&3], 12.349, 100.0, "analog output");
    assert_close(decoded.temperature_sensor[&6], 21.37, 10.0, "temperature");
    assert_close(decoded.humidity_sensor[&7], 47.3, 2.0, "humidity");
    assert_close(decoded.barometer[&9], 1013.26, 10.0, "barometer");
    assert_close(decoded.voltage[&12], 3.304, 100.0, "voltage");
    assert_close(decoded.current[&13], 0.1234, 1000.0, "current");
    assert_close(decoded.frequency[&14], 50.2, 1.0, "frequency");
    assert_close(decoded.energy[&15], 1.0005, 1000.0, "energy");

    let accel = decoded.accelerometer[&8];
    assert_close(accel.x, -0.5004, 1000.0, "accelerometer x");
    assert_close(accel.z, 0.9812, 1000.0, "accelerometer z");

    let gyro = decoded.gyrometer[&10];
    assert_close(gyro.x, 1.234, 100.0, "gyrometer x");
    assert_close(gyro.y, -5.678, 100.0, "gyrometer y");

    let gps = decoded.gps_location[&11];
    assert_close(gps.latitude, 52.36551, 10000.0, "latitude");
    assert_close(gps.longitude, -4.88852, 10000.0, "longitude");
    assert_close(gps.altitude, 21.543, 100.0, "altitude");
}

#[test]
fn test_quantized_readings_are_a_fixed_point() {
    let codec = CayenneLpp::new();

    let first = codec.encode(&sensor_suite()).unwrap();
    let decoded = codec.decode(&first).unwrap();
    let second = codec.encode(&decoded).unwrap();

    assert_eq!(first, second);
    assert_eq!(codec.decode(&second).unwrap(), decoded);
}

#[test]
fn test_wire_bytes_decode_and_reencode_identically() {
    let codec = CayenneLpp::new();
    // Temperature ch1 20.0, Humidity ch2 65.5, GPS ch3
    let payload = vec![
        0x01, 0x67, 0x00, 0xC8, //
        0x02, 0x68, 0x83, //
        0x03, 0x88, 0x06, 0x76, 0x5F, 0xF2, 0x96, 0x0A, 0x00, 0x03, 0xE8,
    ];

    let readings = codec.decode(&payload).unwrap();
    assert_eq!(readings.temperature_sensor.get(&1), Some(&20.0));
    assert_eq!(readings.humidity_sensor.get(&2), Some(&65.5));

    assert_eq!(codec.encode(&readings).unwrap(), payload);
}

#[test]
fn test_every_truncation_of_a_valid_payload_is_rejected() {
    let codec = CayenneLpp::new();
    let payload = codec.encode(&sensor_suite()).unwrap();

    // Record boundaries are the only prefixes that still decode
    let boundaries: Vec<usize> = {
        let mut offsets = vec![0];
        let mut readings = Readings::new();
        for (channel, reading) in sensor_suite().iter() {
            readings.insert(channel, reading).unwrap();
            offsets.push(codec.encode(&readings).unwrap().len());
        }
        offsets
    };

    for cut in 0..payload.len() {
        let result = codec.decode(&payload[..cut]);
        if boundaries.contains(&cut) {
            assert!(result.is_ok(), "prefix of {} bytes should decode", cut);
        } else {
            assert!(result.is_err(), "prefix of {} bytes should be rejected", cut);
        }
    }
}

#[test]
fn test_registry_resolves_cayenne_by_name() {
    let registry = CodecRegistry::with_builtin_codecs();
    let codec = registry.get(CAYENNE_LPP).unwrap();

    let readings = codec.decode(&[0x01, 0x67, 0x00, 0xC8]).unwrap();
    assert_eq!(readings.temperature_sensor.get(&1), Some(&20.0));
}

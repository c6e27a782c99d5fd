//! Sensor payload decoding
//! This module turns the fixed-layout, little-endian payloads pushed by the supported
//! sensors into physical quantities.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sensor models with a known payload layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorModel {
    /// HDC1000 humidity/temperature sensor
    Hdc1000,
    /// BMP280 pressure/temperature sensor
    Bmp280,
    /// TMP007 IR temperature sensor
    Tmp007,
    /// MPU9250 motion sensor (gyro, accelerometer, magnetometer)
    Mpu9250,
    /// OPT3001 optical sensor
    Opt3001,
    /// Sensors that push a plain IEEE-754 single (SHT31 Humigadget)
    Float32,
}

impl SensorModel {
    /// Minimum payload length, in bytes, for this model
    pub fn payload_len(self) -> usize {
        match self {
            Self::Hdc1000 => 4,
            Self::Bmp280 => 6,
            Self::Tmp007 => 4,
            Self::Mpu9250 => 18,
            Self::Opt3001 => 2,
            Self::Float32 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed {model:?} payload: expected at least {expected} bytes, got {actual}")]
    MalformedPayload {
        model: SensorModel,
        expected: usize,
        actual: usize,
    },
}

/// A named physical quantity produced by a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Temperature,
    RelativeHumidity,
    Pressure,
    ObjectTemperature,
    AmbientTemperature,
    GyroX,
    GyroY,
    GyroZ,
    AccelX,
    AccelY,
    AccelZ,
    MagX,
    MagY,
    MagZ,
    Illuminance,
    Value,
}

impl Quantity {
    /// Short label used in telemetry log lines
    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "T",
            Self::RelativeHumidity => "RH",
            Self::Pressure => "P",
            Self::ObjectTemperature => "Tobj",
            Self::AmbientTemperature => "Tamb",
            Self::GyroX => "gx",
            Self::GyroY => "gy",
            Self::GyroZ => "gz",
            Self::AccelX => "ax",
            Self::AccelY => "ay",
            Self::AccelZ => "az",
            Self::MagX => "mx",
            Self::MagY => "my",
            Self::MagZ => "mz",
            Self::Illuminance => "lux",
            Self::Value => "val",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature | Self::ObjectTemperature | Self::AmbientTemperature => "degC",
            Self::RelativeHumidity => "%",
            Self::Pressure => "hPa",
            Self::GyroX | Self::GyroY | Self::GyroZ => "deg/s",
            Self::AccelX | Self::AccelY | Self::AccelZ => "g",
            Self::MagX | Self::MagY | Self::MagZ => "uT",
            Self::Illuminance => "lux",
            Self::Value => "",
        }
    }
}

/// One decoded value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub quantity: Quantity,
    pub value: f64,
}

impl Measurement {
    fn new(quantity: Quantity, value: f64) -> Self {
        Self { quantity, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumidityTemperature {
    /// Temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureTemperature {
    /// Temperature in °C
    pub temperature: f64,
    /// Barometric pressure in hPa
    pub pressure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrTemperature {
    pub object: f64,
    pub ambient: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    /// Gyroscope axes in °/s
    pub gyro: [f64; 3],
    /// Accelerometer axes in g
    pub accel: [f64; 3],
    /// Raw magnetometer axes
    pub mag: [f64; 3],
}

fn check_len(model: SensorModel, payload: &[u8]) -> Result<(), CodecError> {
    let expected = model.payload_len();
    if payload.len() < expected {
        return Err(CodecError::MalformedPayload {
            model,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

fn u16_at(payload: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([payload[offset], payload[offset + 1]])
}

fn i16_at(payload: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([payload[offset], payload[offset + 1]])
}

fn u24_at(payload: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([payload[offset], payload[offset + 1], payload[offset + 2], 0])
}

/// HDC1000: two u16 fields, temperature then humidity.
pub fn decode_humidity_temperature(payload: &[u8]) -> Result<HumidityTemperature, CodecError> {
    check_len(SensorModel::Hdc1000, payload)?;
    let raw_temp = u16_at(payload, 0) as f64;
    let raw_hum = (u16_at(payload, 2) & !0x0003) as f64;
    Ok(HumidityTemperature {
        temperature: raw_temp / 65536.0 * 165.0 - 40.0,
        humidity: 100.0 * raw_hum / 65536.0,
    })
}

/// BMP280: two packed 24-bit fields, temperature then pressure, both in hundredths.
pub fn decode_pressure_temperature(payload: &[u8]) -> Result<PressureTemperature, CodecError> {
    check_len(SensorModel::Bmp280, payload)?;
    Ok(PressureTemperature {
        temperature: u24_at(payload, 0) as f64 / 100.0,
        pressure: u24_at(payload, 3) as f64 / 100.0,
    })
}

pub fn decode_ir_temperature(payload: &[u8]) -> Result<IrTemperature, CodecError> {
    check_len(SensorModel::Tmp007, payload)?;
    const SCALE: f64 = 0.03125 / 2.0;
    Ok(IrTemperature {
        object: i16_at(payload, 0) as f64 * SCALE,
        ambient: i16_at(payload, 2) as f64 * SCALE,
    })
}

/// MPU9250: nine i16 fields, gyro xyz, accel xyz, mag xyz.
pub fn decode_motion(payload: &[u8]) -> Result<Motion, CodecError> {
    check_len(SensorModel::Mpu9250, payload)?;
    const GYRO_SCALE: f64 = 500.0 / 65536.0;
    const ACCEL_SCALE: f64 = 4.0 / 16384.0;
    let axis = |index: usize| i16_at(payload, index * 2) as f64;
    Ok(Motion {
        gyro: [axis(0) * GYRO_SCALE, axis(1) * GYRO_SCALE, axis(2) * GYRO_SCALE],
        accel: [axis(3) * ACCEL_SCALE, axis(4) * ACCEL_SCALE, axis(5) * ACCEL_SCALE],
        mag: [axis(6), axis(7), axis(8)],
    })
}

/// OPT3001: 12-bit mantissa and 4-bit exponent packed in one u16.
pub fn decode_optical(payload: &[u8]) -> Result<f64, CodecError> {
    check_len(SensorModel::Opt3001, payload)?;
    let raw = u16_at(payload, 0);
    let mantissa = (raw & 0x0FFF) as f64;
    let exponent = (raw >> 12) as i32;
    let multiplier = if exponent == 0 {
        1.0
    } else {
        2f64.powi(exponent - 1)
    };
    Ok(mantissa * 0.01 * multiplier)
}

pub fn decode_float32(payload: &[u8]) -> Result<f64, CodecError> {
    check_len(SensorModel::Float32, payload)?;
    Ok(f32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as f64)
}

/// Decodes `payload` according to `model`.
///
/// Measurements come back in the model's field order; that order is what the
/// notification path uses as the sub-channel id.
pub fn decode(model: SensorModel, payload: &[u8]) -> Result<Vec<Measurement>, CodecError> {
    let measurements = match model {
        SensorModel::Hdc1000 => {
            let th = decode_humidity_temperature(payload)?;
            vec![
                Measurement::new(Quantity::Temperature, th.temperature),
                Measurement::new(Quantity::RelativeHumidity, th.humidity),
            ]
        }
        SensorModel::Bmp280 => {
            let pt = decode_pressure_temperature(payload)?;
            vec![
                Measurement::new(Quantity::Temperature, pt.temperature),
                Measurement::new(Quantity::Pressure, pt.pressure),
            ]
        }
        SensorModel::Tmp007 => {
            let ir = decode_ir_temperature(payload)?;
            vec![
                Measurement::new(Quantity::ObjectTemperature, ir.object),
                Measurement::new(Quantity::AmbientTemperature, ir.ambient),
            ]
        }
        SensorModel::Mpu9250 => {
            let m = decode_motion(payload)?;
            vec![
                Measurement::new(Quantity::GyroX, m.gyro[0]),
                Measurement::new(Quantity::GyroY, m.gyro[1]),
                Measurement::new(Quantity::GyroZ, m.gyro[2]),
                Measurement::new(Quantity::AccelX, m.accel[0]),
                Measurement::new(Quantity::AccelY, m.accel[1]),
                Measurement::new(Quantity::AccelZ, m.accel[2]),
                Measurement::new(Quantity::MagX, m.mag[0]),
                Measurement::new(Quantity::MagY, m.mag[1]),
                Measurement::new(Quantity::MagZ, m.mag[2]),
            ]
        }
        SensorModel::Opt3001 => vec![Measurement::new(Quantity::Illuminance, decode_optical(payload)?)],
        SensorModel::Float32 => vec![Measurement::new(Quantity::Value, decode_float32(payload)?)],
    };
    Ok(measurements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn humidity_temperature_zero_payload() {
        let th = decode_humidity_temperature(&[0x00, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(th.temperature, -40.0);
        assert_eq!(th.humidity, 0.0);
    }

    #[test]
    fn humidity_ignores_status_bits() {
        // temperature 0x8000, humidity 0x8003 with the two status bits set
        let th = decode_humidity_temperature(&[0x00, 0x80, 0x03, 0x80]).unwrap();
        assert_eq!(th.temperature, 42.5);
        assert_eq!(th.humidity, 50.0);
    }

    #[test]
    fn pressure_temperature_from_packed_24_bit_fields() {
        // 2500 -> 25.00 degC, 101325 -> 1013.25 hPa
        let pt = decode_pressure_temperature(&[0xC4, 0x09, 0x00, 0xCD, 0x8B, 0x01]).unwrap();
        assert_eq!(pt.temperature, 25.0);
        assert_eq!(pt.pressure, 1013.25);
    }

    #[test]
    fn ir_temperature_is_signed() {
        let ir = decode_ir_temperature(&[0x80, 0x0C, 0x60, 0xFF]).unwrap();
        assert_eq!(ir.object, 50.0);
        assert_eq!(ir.ambient, -2.5);
    }

    #[test]
    fn motion_scales_each_sensor_block() {
        let mut payload = Vec::new();
        for raw in [1311i16, -1311, 0, 4096, -4096, 8192, -50, 0, 120] {
            payload.extend_from_slice(&raw.to_le_bytes());
        }
        let m = decode_motion(&payload).unwrap();
        assert_relative_eq!(m.gyro[0], 1311.0 * 500.0 / 65536.0, max_relative = 1e-6);
        assert_relative_eq!(m.gyro[1], -1311.0 * 500.0 / 65536.0, max_relative = 1e-6);
        assert_eq!(m.gyro[2], 0.0);
        assert_eq!(m.accel, [1.0, -1.0, 2.0]);
        assert_eq!(m.mag, [-50.0, 0.0, 120.0]);
    }

    #[test]
    fn optical_with_zero_exponent() {
        assert_relative_eq!(decode_optical(&[0x64, 0x00]).unwrap(), 1.0, max_relative = 1e-9);
    }

    #[test]
    fn optical_exponent_scales_by_power_of_two() {
        // mantissa 100, exponent 3 -> multiplier 4
        assert_relative_eq!(decode_optical(&[0x64, 0x30]).unwrap(), 4.0, max_relative = 1e-9);
        // exponent 1 shares the unit multiplier with exponent 0
        assert_relative_eq!(decode_optical(&[0x64, 0x10]).unwrap(), 1.0, max_relative = 1e-9);
    }

    #[test]
    fn float32_little_endian() {
        assert_relative_eq!(decode_float32(&[0x00, 0x00, 0xBC, 0x41]).unwrap(), 23.5, max_relative = 1e-6);
    }

    #[test]
    fn short_payload_is_rejected() {
        let err = decode(SensorModel::Mpu9250, &[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            CodecError::MalformedPayload {
                model: SensorModel::Mpu9250,
                expected: 18,
                actual: 10
            }
        );
        assert!(decode(SensorModel::Opt3001, &[0x01]).is_err());
    }

    #[test]
    fn decode_keeps_field_order() {
        let values = decode(SensorModel::Hdc1000, &[0x00, 0x80, 0x03, 0x80]).unwrap();
        let quantities: Vec<_> = values.iter().map(|m| m.quantity).collect();
        assert_eq!(quantities, vec![Quantity::Temperature, Quantity::RelativeHumidity]);
        assert_eq!(decode(SensorModel::Mpu9250, &[0u8; 18]).unwrap().len(), 9);
    }

    #[test]
    fn decoding_is_deterministic() {
        let payload = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(
            decode(SensorModel::Float32, &payload).unwrap(),
            decode(SensorModel::Float32, &payload).unwrap()
        );
    }
}

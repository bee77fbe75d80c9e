//! Raw sensor encodings to physical units.
//!
//! All conversions are pure and total: negative, zero, and implausibly
//! large inputs pass through unclamped. Range validation is deliberately
//! not performed here.

/// PressureMeasurement `measured_value` to kilopascals.
pub fn pressure_kpa(raw: i64) -> f64 {
    raw as f64 / 1000.0
}

/// RelativeHumidity `measured_value` to percent.
pub fn relative_humidity_pcnt(raw: i64) -> f64 {
    raw as f64 / 100.0
}

/// TemperatureMeasurement `measured_value` to degrees Celsius.
pub fn temperature_celsius(raw: i64) -> f64 {
    raw as f64 / 100.0
}

/// SoilMoisture `measured_value` to percent.
pub fn soil_moisture_pcnt(raw: i64) -> f64 {
    raw as f64 / 100.0
}

/// PowerConfiguration `battery_percentage_remaining` to percent.
///
/// Aqara and Tuya firmware report the percentage pre-doubled, so the raw
/// value is halved here. This is a vendor quirk specific to those devices,
/// not a ZCL rule; keep it as this one named correction and do not fold it
/// into a generic battery formula.
pub fn battery_pcnt(raw: i64) -> f64 {
    raw as f64 / 2.0
}

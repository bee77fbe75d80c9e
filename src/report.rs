//! Attribute reports and measurement classification tags.

use crate::device::Ieee;

/// ZCL cluster ids for the measurement clusters this exporter understands.
pub const CLUSTER_POWER_CONFIGURATION: u16 = 0x0001;
pub const CLUSTER_TEMPERATURE: u16 = 0x0402;
pub const CLUSTER_PRESSURE: u16 = 0x0403;
pub const CLUSTER_RELATIVE_HUMIDITY: u16 = 0x0405;
pub const CLUSTER_SOIL_MOISTURE: u16 = 0x0408;

/// The category of physical quantity an attribute report conveys.
///
/// Closed union over the measurement clusters the exporter knows how to
/// convert; everything else lands in `Unknown` with its cluster id so the
/// tag can still be traced. Adding a new domain forces every match site
/// to be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementDomain {
    Pressure,
    Humidity,
    Temperature,
    SoilMoisture,
    BatteryLevel,
    Unknown(u16),
}

impl MeasurementDomain {
    /// Classify a raw ZCL cluster id into a measurement domain.
    pub fn from_cluster(cluster_id: u16) -> Self {
        match cluster_id {
            CLUSTER_PRESSURE => MeasurementDomain::Pressure,
            CLUSTER_RELATIVE_HUMIDITY => MeasurementDomain::Humidity,
            CLUSTER_TEMPERATURE => MeasurementDomain::Temperature,
            CLUSTER_SOIL_MOISTURE => MeasurementDomain::SoilMoisture,
            CLUSTER_POWER_CONFIGURATION => MeasurementDomain::BatteryLevel,
            other => MeasurementDomain::Unknown(other),
        }
    }
}

/// One periodic attribute report delivered by the radio session.
///
/// Transient: constructed per inbound frame, consumed immediately by the
/// report handler, never retained.
#[derive(Debug, Clone)]
pub struct AttributeReport {
    /// Originating device.
    pub source: Ieee,

    /// Measurement domain derived from the report's cluster id.
    pub domain: MeasurementDomain,

    /// Raw sensor encoding, if the frame carried a parseable integer.
    pub raw_value: Option<i64>,

    /// Source endpoint on the device.
    pub endpoint: u8,
}

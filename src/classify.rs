//! Classification of attribute reports into exportable metric samples.

use tracing::debug;

use crate::convert;
use crate::report::{AttributeReport, MeasurementDomain};

/// The gauges this exporter defines. One variant per measurement domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    TempCelsius,
    HumidityPcnt,
    PressureKpa,
    SoilMoisturePct,
    BatteryPcnt,
}

impl Metric {
    /// Prometheus metric name.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::TempCelsius => "temp_celsius",
            Metric::HumidityPcnt => "humidity_pcnt",
            Metric::PressureKpa => "pressure_kpa",
            Metric::SoilMoisturePct => "soil_moisture_pct",
            Metric::BatteryPcnt => "battery_pcnt",
        }
    }

    /// HELP text for the exposition format.
    pub fn help(&self) -> &'static str {
        match self {
            Metric::TempCelsius => "Temperature (C)",
            Metric::HumidityPcnt => "Relative humidity (%)",
            Metric::PressureKpa => "Atmospheric pressure (kPa)",
            Metric::SoilMoisturePct => "Soil moisture (%)",
            Metric::BatteryPcnt => "Remaining battery (%)",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A converted measurement ready for publication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub metric: Metric,
    pub value: f64,
}

/// Classify a report and convert its raw value into a physical unit.
///
/// Returns `None` for unknown domains and for reports whose payload did not
/// carry a parseable value; both paths are diagnostic traces, never errors.
/// The match over [`MeasurementDomain`] is exhaustive, so a new domain
/// cannot be added without a conversion rule.
pub fn classify(report: &AttributeReport) -> Option<Sample> {
    let (metric, convert): (Metric, fn(i64) -> f64) = match report.domain {
        MeasurementDomain::Pressure => (Metric::PressureKpa, convert::pressure_kpa),
        MeasurementDomain::Humidity => (Metric::HumidityPcnt, convert::relative_humidity_pcnt),
        MeasurementDomain::Temperature => (Metric::TempCelsius, convert::temperature_celsius),
        MeasurementDomain::SoilMoisture => (Metric::SoilMoisturePct, convert::soil_moisture_pcnt),
        MeasurementDomain::BatteryLevel => (Metric::BatteryPcnt, convert::battery_pcnt),
        MeasurementDomain::Unknown(tag) => {
            debug!(
                source = %report.source,
                cluster = %format_args!("0x{:04x}", tag),
                endpoint = report.endpoint,
                "unknown measurement cluster, skipping"
            );
            return None;
        }
    };

    let Some(raw) = report.raw_value else {
        debug!(
            source = %report.source,
            metric = %metric,
            endpoint = report.endpoint,
            "report carried no parseable value, skipping"
        );
        return None;
    };

    Some(Sample {
        metric,
        value: convert(raw),
    })
}

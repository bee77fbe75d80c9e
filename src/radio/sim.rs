//! Simulated radio driver.
//!
//! Generates plausible, time-varying attribute reports for the configured
//! devices so the full pipeline can run without coordinator hardware.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::info;

use super::{RadioDriver, RadioError};
use crate::device::DeviceEntry;
use crate::report::{AttributeReport, MeasurementDomain};

/// Offline driver emitting one batch of reports per device per tick.
pub struct SimulatedRadio {
    devices: Vec<DeviceEntry>,
    interval: Duration,
    tick: u64,
    queue: VecDeque<AttributeReport>,
}

impl SimulatedRadio {
    pub fn new(devices: Vec<DeviceEntry>, interval: Duration) -> Self {
        Self {
            devices,
            interval,
            tick: 0,
            queue: VecDeque::new(),
        }
    }

    fn refill(&mut self) {
        for (i, device) in self.devices.iter().enumerate() {
            let phase = self.tick.wrapping_add(i as u64 * 37);

            // Values wander inside realistic sensor ranges.
            let temp_raw = 1900 + (phase.wrapping_mul(73) % 800) as i64;
            let humidity_raw = 4000 + (phase.wrapping_mul(131) % 3000) as i64;
            let soil_raw = 1500 + (phase.wrapping_mul(53) % 2500) as i64;
            let pressure_raw = 100_500 + (phase.wrapping_mul(17) % 1500) as i64;
            let battery_raw = 200 - (phase % 60) as i64;

            let domains = [
                (MeasurementDomain::Temperature, temp_raw),
                (MeasurementDomain::Humidity, humidity_raw),
                (MeasurementDomain::SoilMoisture, soil_raw),
                (MeasurementDomain::Pressure, pressure_raw),
                (MeasurementDomain::BatteryLevel, battery_raw),
            ];

            for (domain, raw) in domains {
                self.queue.push_back(AttributeReport {
                    source: device.ieee,
                    domain,
                    raw_value: Some(raw),
                    endpoint: 1,
                });
            }

            // Occasionally surface an unhandled cluster so the diagnostic
            // path is exercised in demo runs.
            if phase % 13 == 0 {
                self.queue.push_back(AttributeReport {
                    source: device.ieee,
                    domain: MeasurementDomain::Unknown(0x0006),
                    raw_value: Some(1),
                    endpoint: 1,
                });
            }
        }

        self.tick = self.tick.wrapping_add(1);
    }
}

impl RadioDriver for SimulatedRadio {
    async fn start(&mut self, form_network: bool) -> Result<(), RadioError> {
        info!(
            form_network,
            devices = self.devices.len(),
            "simulated radio session started"
        );
        Ok(())
    }

    async fn permit_join(&mut self, duration_secs: u16) -> Result<(), RadioError> {
        info!(duration_secs, "simulated join window opened");
        Ok(())
    }

    async fn next_report(&mut self) -> Result<AttributeReport, RadioError> {
        loop {
            if let Some(report) = self.queue.pop_front() {
                return Ok(report);
            }

            tokio::time::sleep(self.interval).await;
            self.refill();
        }
    }

    async fn shutdown(&mut self) -> Result<(), RadioError> {
        info!("simulated radio session stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Ieee;

    fn devices() -> Vec<DeviceEntry> {
        vec![DeviceEntry {
            ieee: Ieee(0x1),
            name: "greenhouse".to_string(),
        }]
    }

    #[tokio::test]
    async fn test_emits_all_recognized_domains() {
        let mut radio = SimulatedRadio::new(devices(), Duration::from_millis(1));
        radio.start(false).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..5 {
            let report = radio.next_report().await.unwrap();
            assert_eq!(report.source, Ieee(0x1));
            assert!(report.raw_value.is_some());
            seen.push(report.domain);
        }

        for domain in [
            MeasurementDomain::Temperature,
            MeasurementDomain::Humidity,
            MeasurementDomain::SoilMoisture,
            MeasurementDomain::Pressure,
            MeasurementDomain::BatteryLevel,
        ] {
            assert!(seen.contains(&domain), "missing {:?}", domain);
        }
    }

    #[tokio::test]
    async fn test_values_stay_in_sensor_ranges() {
        let mut radio = SimulatedRadio::new(devices(), Duration::from_millis(1));

        for _ in 0..20 {
            let report = radio.next_report().await.unwrap();
            let raw = report.raw_value.unwrap();
            match report.domain {
                MeasurementDomain::Temperature => assert!((1900..2700).contains(&raw)),
                MeasurementDomain::Humidity => assert!((4000..7000).contains(&raw)),
                MeasurementDomain::SoilMoisture => assert!((1500..4000).contains(&raw)),
                MeasurementDomain::Pressure => assert!((100_500..102_000).contains(&raw)),
                MeasurementDomain::BatteryLevel => assert!((140..=200).contains(&raw)),
                MeasurementDomain::Unknown(_) => {}
            }
        }
    }
}

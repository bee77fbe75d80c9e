//! Per-report orchestration: resolve, classify, publish.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info};

use crate::classify::{self, Metric};
use crate::device::DeviceDirectory;
use crate::report::AttributeReport;

/// Write-side abstraction over the metrics store.
///
/// `set` is last-write-wins per `(metric, location)` and idempotent under
/// retry; the core never depends on the store's transport.
pub trait MetricPublisher {
    fn set(&self, metric: Metric, location: &str, value: f64);
}

impl<P: MetricPublisher + ?Sized> MetricPublisher for std::sync::Arc<P> {
    fn set(&self, metric: Metric, location: &str, value: f64) {
        (**self).set(metric, location, value)
    }
}

/// Orchestrates one attribute report from identity resolution to publish.
pub struct ReportHandler<P> {
    directory: DeviceDirectory,
    publisher: P,
}

impl<P: MetricPublisher> ReportHandler<P> {
    pub fn new(directory: DeviceDirectory, publisher: P) -> Self {
        Self {
            directory,
            publisher,
        }
    }

    /// The publisher this handler writes to.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Process one report.
    ///
    /// Never propagates a failure to the caller: the caller is the radio
    /// session's receive loop, and a fault in one report must not stall
    /// delivery of subsequent reports or terminate the process.
    pub fn handle(&self, report: &AttributeReport) {
        let Some(name) = self.directory.resolve(report.source) else {
            // Still log the measurement so newly joined devices can be
            // identified and added to the configuration.
            debug!(
                source = %report.source,
                domain = ?report.domain,
                raw_value = report.raw_value,
                endpoint = report.endpoint,
                "report from unconfigured device, not publishing"
            );
            return;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.publish(name, report);
        }));

        if let Err(cause) = outcome {
            error!(
                source = %report.source,
                location = name,
                domain = ?report.domain,
                raw_value = report.raw_value,
                panic = panic_message(cause.as_ref()),
                "report processing panicked, dropping report"
            );
        }
    }

    fn publish(&self, name: &str, report: &AttributeReport) {
        let Some(sample) = classify::classify(report) else {
            return;
        };

        self.publisher.set(sample.metric, name, sample.value);
        info!("[{}] {}={}", name, sample.metric, sample.value);
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceDirectory, DeviceEntry, Ieee};
    use crate::report::MeasurementDomain;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        samples: Mutex<Vec<(Metric, String, f64)>>,
    }

    impl MetricPublisher for RecordingPublisher {
        fn set(&self, metric: Metric, location: &str, value: f64) {
            self.samples
                .lock()
                .push((metric, location.to_string(), value));
        }
    }

    /// Publisher that panics for one location, to exercise fault isolation.
    struct FaultyPublisher {
        poison: &'static str,
        inner: RecordingPublisher,
    }

    impl MetricPublisher for FaultyPublisher {
        fn set(&self, metric: Metric, location: &str, value: f64) {
            if location == self.poison {
                panic!("injected publisher fault");
            }
            self.inner.set(metric, location, value);
        }
    }

    fn directory() -> DeviceDirectory {
        DeviceDirectory::from_entries(&[
            DeviceEntry {
                ieee: Ieee(0x00124b0001),
                name: "greenhouse".to_string(),
            },
            DeviceEntry {
                ieee: Ieee(0x00124b0002),
                name: "cellar".to_string(),
            },
        ])
        .unwrap()
    }

    fn report(source: u64, domain: MeasurementDomain, raw_value: Option<i64>) -> AttributeReport {
        AttributeReport {
            source: Ieee(source),
            domain,
            raw_value,
            endpoint: 1,
        }
    }

    #[test]
    fn test_handle_publishes_resolved_temperature() {
        let handler = ReportHandler::new(directory(), RecordingPublisher::default());

        handler.handle(&report(
            0x00124b0001,
            MeasurementDomain::Temperature,
            Some(2150),
        ));

        let samples = handler.publisher.samples.lock();
        assert_eq!(
            samples.as_slice(),
            &[(Metric::TempCelsius, "greenhouse".to_string(), 21.5)]
        );
    }

    #[test]
    fn test_handle_unresolved_device_never_publishes() {
        let handler = ReportHandler::new(directory(), RecordingPublisher::default());

        handler.handle(&report(0xdead, MeasurementDomain::Temperature, Some(2150)));

        assert!(handler.publisher.samples.lock().is_empty());
    }

    #[test]
    fn test_handle_unknown_domain_never_publishes() {
        let handler = ReportHandler::new(directory(), RecordingPublisher::default());

        handler.handle(&report(
            0x00124b0001,
            MeasurementDomain::Unknown(0x0500),
            Some(1),
        ));

        assert!(handler.publisher.samples.lock().is_empty());
    }

    #[test]
    fn test_handle_missing_value_never_publishes() {
        let handler = ReportHandler::new(directory(), RecordingPublisher::default());

        handler.handle(&report(0x00124b0001, MeasurementDomain::Humidity, None));

        assert!(handler.publisher.samples.lock().is_empty());
    }

    #[test]
    fn test_fault_in_one_report_does_not_affect_the_next() {
        let handler = ReportHandler::new(
            directory(),
            FaultyPublisher {
                poison: "greenhouse",
                inner: RecordingPublisher::default(),
            },
        );

        // This one panics inside the publisher and must be contained.
        handler.handle(&report(
            0x00124b0001,
            MeasurementDomain::Temperature,
            Some(2150),
        ));

        // A well-formed report for a different device still goes through.
        handler.handle(&report(
            0x00124b0002,
            MeasurementDomain::Humidity,
            Some(5550),
        ));

        let samples = handler.publisher.inner.samples.lock();
        assert_eq!(
            samples.as_slice(),
            &[(Metric::HumidityPcnt, "cellar".to_string(), 55.5)]
        );
    }

    #[test]
    fn test_handle_battery_quirk_end_to_end() {
        let handler = ReportHandler::new(directory(), RecordingPublisher::default());

        handler.handle(&report(
            0x00124b0002,
            MeasurementDomain::BatteryLevel,
            Some(200),
        ));

        let samples = handler.publisher.samples.lock();
        assert_eq!(
            samples.as_slice(),
            &[(Metric::BatteryPcnt, "cellar".to_string(), 100.0)]
        );
    }
}

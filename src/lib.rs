//! Prometheus metrics exporter for a Zigbee sensor mesh.
//!
//! A long-running daemon sits between a mesh coordinator and Prometheus:
//! paired devices send periodic attribute reports, each report is classified
//! by measurement cluster, converted to physical units, resolved to an
//! operator-assigned location name, and exposed as a labeled gauge.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Radio session  │────>│  ReportHandler  │────>│   HTTP Server   │
//! │  (coordinator)  │     │ classify+convert│     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! A second binary, `zigbee-permit-join`, opens a bounded join-admission
//! window so new devices can pair with the mesh.

pub mod classify;
pub mod config;
pub mod convert;
pub mod device;
pub mod handler;
pub mod http;
pub mod radio;
pub mod report;
pub mod store;

// Re-export commonly used types at the crate root
pub use classify::{Metric, Sample, classify};
pub use config::{ConfigError, ExporterConfig, LogFormat, LoggingConfig};
pub use device::{DeviceDirectory, DeviceEntry, Ieee};
pub use handler::{MetricPublisher, ReportHandler};
pub use http::HttpServer;
pub use radio::{RadioDriver, RadioError, RadioSessionLifecycle, SessionState};
pub use report::{AttributeReport, MeasurementDomain};
pub use store::{MetricStore, SharedStore};

/// Initialize tracing with the given configuration.
///
/// Supports human-readable text output (default) and structured JSON for
/// log aggregation systems.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| {
                    ConfigError::Validation(format!("Failed to initialize tracing: {}", e))
                })?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| {
                    ConfigError::Validation(format!("Failed to initialize tracing: {}", e))
                })?;
        }
    }

    Ok(())
}

//! Configuration for the exporter and permit-join binaries.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::DeviceEntry;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Radio session settings.
    #[serde(default)]
    pub radio: RadioConfig,

    /// Prometheus endpoint settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Devices to export. Required by the exporter, optional for
    /// permit-join runs.
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Radio session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Serial device of the coordinator (default: "/dev/ttyUSB0").
    #[serde(default = "default_radio_device")]
    pub device: String,

    /// Serial baud rate (default: 115200).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Persisted mesh state. Presence decides rejoin vs. form-network
    /// when permitting joins (default: "zigbee.db").
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Join-admission window opened after session start, in seconds
    /// (default: 0, window closed).
    #[serde(default)]
    pub permit_join_secs: u16,

    /// Use the simulated radio driver instead of the serial coordinator.
    #[serde(default)]
    pub simulate: bool,
}

fn default_radio_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_database_path() -> PathBuf {
    PathBuf::from("zigbee.db")
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            device: default_radio_device(),
            baud_rate: default_baud_rate(),
            database_path: default_database_path(),
            permit_join_secs: 0,
            simulate: false,
        }
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9102").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for the metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9102".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ExporterConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Duplicate device identities are caught separately when the device
    /// directory is built, before the radio session opens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if self.radio.device.is_empty() {
            return Err(ConfigError::Validation(
                "Radio device path cannot be empty".to_string(),
            ));
        }

        if self.radio.baud_rate == 0 {
            return Err(ConfigError::Validation(
                "baud_rate must be > 0".to_string(),
            ));
        }

        for device in &self.devices {
            if device.name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Device {}: name cannot be empty",
                    device.ieee
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = ExporterConfig::parse("{}").unwrap();

        assert_eq!(config.radio.device, "/dev/ttyUSB0");
        assert_eq!(config.radio.baud_rate, 115_200);
        assert_eq!(config.radio.database_path, PathBuf::from("zigbee.db"));
        assert_eq!(config.radio.permit_join_secs, 0);
        assert!(!config.radio.simulate);
        assert_eq!(config.prometheus.listen, "0.0.0.0:9102");
        assert_eq!(config.prometheus.path, "/metrics");
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            radio: {
                device: "/dev/ttyACM0",
                baud_rate: 57600,
                database_path: "/var/lib/zigbee/mesh.db",
                permit_join_secs: 240,
            },
            prometheus: {
                listen: "127.0.0.1:9200",
                path: "/zigbee/metrics",
            },
            devices: [
                { ieee: "0x00124b0001", name: "greenhouse" },
                { ieee: "00:12:4b:00:00:00:00:02", name: "cellar" },
            ],
            logging: {
                level: "debug",
                format: "json",
            },
        }"#;

        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.radio.device, "/dev/ttyACM0");
        assert_eq!(config.radio.baud_rate, 57_600);
        assert_eq!(config.radio.permit_join_secs, 240);
        assert_eq!(config.prometheus.listen, "127.0.0.1:9200");
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].name, "greenhouse");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_invalid_listen() {
        let result = ExporterConfig::parse(r#"{ prometheus: { listen: "not-an-address" } }"#);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_validate_invalid_path() {
        let result = ExporterConfig::parse(r#"{ prometheus: { path: "no-leading-slash" } }"#);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must start with /")
        );
    }

    #[test]
    fn test_validate_empty_device_name() {
        let result =
            ExporterConfig::parse(r#"{ devices: [{ ieee: "0x1", name: "" }] }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_invalid_ieee() {
        let result =
            ExporterConfig::parse(r#"{ devices: [{ ieee: "garbage", name: "greenhouse" }] }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ devices: [{{ ieee: "0x00124b0001", name: "greenhouse" }}] }}"#
        )
        .unwrap();

        let config = ExporterConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.devices.len(), 1);
    }
}

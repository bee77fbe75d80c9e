//! Device identities and the operator-assigned name directory.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors raised while building the device directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("duplicate device identity {ieee} ('{first}' and '{second}')")]
    DuplicateIdentity {
        ieee: Ieee,
        first: String,
        second: String,
    },
}

/// IEEE 802.15.4 64-bit hardware address of a mesh device.
///
/// Kept as a fixed-width integer internally; the string forms
/// (`00:12:4b:00:00:00:00:01` or `0x00124b0000000001`) only appear at the
/// configuration and log boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ieee(pub u64);

impl fmt::Display for Ieee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        for (i, b) in bytes.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Error parsing an IEEE address from its string form.
#[derive(Debug, Error)]
#[error("invalid IEEE address '{0}'")]
pub struct ParseIeeeError(String);

impl FromStr for Ieee {
    type Err = ParseIeeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex: String = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed)
            .chars()
            .filter(|c| *c != ':')
            .collect();

        if hex.is_empty() || hex.len() > 16 {
            return Err(ParseIeeeError(s.to_string()));
        }

        u64::from_str_radix(&hex, 16)
            .map(Ieee)
            .map_err(|_| ParseIeeeError(s.to_string()))
    }
}

impl Serialize for Ieee {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ieee {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One configured device: hardware address plus operator-assigned name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// IEEE address of the device.
    pub ieee: Ieee,

    /// Friendly name used as the metric `location` label.
    pub name: String,
}

/// Read-only mapping from hardware address to friendly name.
///
/// Built once at startup; a lookup miss means "device not configured for
/// export" and is not an error.
#[derive(Debug, Default)]
pub struct DeviceDirectory {
    names: HashMap<Ieee, String>,
}

impl DeviceDirectory {
    /// Build the directory from configuration entries.
    ///
    /// Fails if two entries share the same identity; this is surfaced
    /// before the radio session starts.
    pub fn from_entries(entries: &[DeviceEntry]) -> Result<Self, DirectoryError> {
        let mut names = HashMap::with_capacity(entries.len());

        for entry in entries {
            if let Some(existing) = names.insert(entry.ieee, entry.name.clone()) {
                return Err(DirectoryError::DuplicateIdentity {
                    ieee: entry.ieee,
                    first: existing,
                    second: entry.name.clone(),
                });
            }
        }

        Ok(Self { names })
    }

    /// Resolve an identity to its friendly name.
    pub fn resolve(&self, ieee: Ieee) -> Option<&str> {
        self.names.get(&ieee).map(String::as_str)
    }

    /// Number of configured devices.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no devices are configured.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

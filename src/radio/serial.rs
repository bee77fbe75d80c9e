//! Serial link to the mesh coordinator firmware.
//!
//! The coordinator owns the Zigbee protocol engine and streams
//! newline-delimited JSON events over its serial port; commands go out the
//! same way. This module speaks only that contract surface, not the radio
//! wire protocol.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, warn};

use super::{RadioDriver, RadioError};
use crate::device::Ieee;
use crate::report::{AttributeReport, MeasurementDomain};

/// How long to wait for the coordinator's ready event after `start`.
const START_TIMEOUT: Duration = Duration::from_secs(10);

/// Inbound events from the coordinator.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WireEvent {
    /// Session is up and the mesh is joined/formed.
    Ready,

    /// One attribute report from a paired device.
    AttributeReport {
        ieee: Ieee,
        cluster: u16,
        #[serde(default)]
        endpoint: u8,
        /// Raw attribute value; may be absent or non-integer.
        #[serde(default)]
        value: Option<serde_json::Value>,
    },

    /// Irrecoverable coordinator-side failure.
    Fault { message: String },
}

/// Outbound commands to the coordinator.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum WireCommand {
    Start { form_network: bool },
    PermitJoin { duration_secs: u16 },
    Shutdown,
}

/// Convert a wire event into an attribute report.
///
/// Non-integer or absent values become `raw_value: None`; the tag is still
/// classified so the unknown-domain diagnostics keep working.
fn to_report(ieee: Ieee, cluster: u16, endpoint: u8, value: Option<serde_json::Value>) -> AttributeReport {
    AttributeReport {
        source: ieee,
        domain: MeasurementDomain::from_cluster(cluster),
        raw_value: value.as_ref().and_then(serde_json::Value::as_i64),
        endpoint,
    }
}

/// Radio driver over any byte transport carrying the coordinator's
/// line-delimited event stream. Production uses a [`SerialStream`].
pub struct SerialRadio<T> {
    reader: BufReader<ReadHalf<T>>,
    writer: WriteHalf<T>,
    line: String,
    start_timeout: Duration,
}

impl SerialRadio<SerialStream> {
    /// Open the coordinator's serial device.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, RadioError> {
        let stream = tokio_serial::new(path, baud_rate)
            .open_native_async()
            .map_err(|e| RadioError::Open(format!("{}: {}", path, e)))?;

        Ok(Self::from_transport(stream))
    }
}

impl<T: AsyncRead + AsyncWrite> SerialRadio<T> {
    /// Wrap an already-open transport.
    pub fn from_transport(transport: T) -> Self {
        let (read, write) = tokio::io::split(transport);
        Self {
            reader: BufReader::new(read),
            writer: write,
            line: String::new(),
            start_timeout: START_TIMEOUT,
        }
    }

    /// Override how long `start` waits for the ready event.
    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }
}

impl<T: AsyncRead + AsyncWrite + Send> SerialRadio<T> {
    async fn send(&mut self, command: &WireCommand) -> Result<(), RadioError> {
        let mut payload = serde_json::to_string(command)
            .map_err(|e| RadioError::Coordinator(format!("command encoding failed: {}", e)))?;
        payload.push('\n');

        self.writer.write_all(payload.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read the next event line, skipping malformed ones.
    async fn next_event(&mut self) -> Result<WireEvent, RadioError> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line).await?;
            if n == 0 {
                return Err(RadioError::Closed);
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<WireEvent>(trimmed) {
                Ok(event) => return Ok(event),
                Err(e) => {
                    // Malformed frames are dropped, never fatal.
                    warn!(line = trimmed, error = %e, "unparseable coordinator event, skipping");
                }
            }
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Send> RadioDriver for SerialRadio<T> {
    async fn start(&mut self, form_network: bool) -> Result<(), RadioError> {
        self.send(&WireCommand::Start { form_network }).await?;

        let start_timeout = self.start_timeout;
        let wait_ready = async {
            loop {
                match self.next_event().await? {
                    WireEvent::Ready => return Ok(()),
                    WireEvent::Fault { message } => return Err(RadioError::Coordinator(message)),
                    WireEvent::AttributeReport { ieee, cluster, .. } => {
                        debug!(%ieee, cluster, "report before session ready, dropping");
                    }
                }
            }
        };

        match timeout(start_timeout, wait_ready).await {
            Ok(result) => result,
            Err(_) => Err(RadioError::StartTimeout),
        }
    }

    async fn permit_join(&mut self, duration_secs: u16) -> Result<(), RadioError> {
        self.send(&WireCommand::PermitJoin { duration_secs }).await
    }

    async fn next_report(&mut self) -> Result<AttributeReport, RadioError> {
        loop {
            match self.next_event().await? {
                WireEvent::AttributeReport {
                    ieee,
                    cluster,
                    endpoint,
                    value,
                } => return Ok(to_report(ieee, cluster, endpoint, value)),
                WireEvent::Ready => debug!("duplicate ready event, ignoring"),
                WireEvent::Fault { message } => return Err(RadioError::Coordinator(message)),
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), RadioError> {
        self.send(&WireCommand::Shutdown).await
    }
}

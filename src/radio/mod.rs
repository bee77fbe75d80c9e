//! Radio session lifecycle and coordinator drivers.
//!
//! The coordinator's protocol engine (network formation, pairing, frame
//! delivery) lives outside this process; the core depends only on the
//! [`RadioDriver`] contract. Two drivers are provided: a serial link to
//! coordinator firmware ([`serial`]) and an offline generator ([`sim`]).

pub mod serial;
pub mod sim;

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info};

use crate::handler::{MetricPublisher, ReportHandler};
use crate::report::AttributeReport;

/// Grace period for session teardown before giving up and exiting non-zero.
pub const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Radio session faults.
///
/// All of these are fatal to the process: the session cannot self-heal
/// without a full re-initialization, so the daemon exits non-zero and
/// leaves restarting to the supervisor.
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("Failed to open radio device: {0}")]
    Open(String),

    #[error("I/O error on radio link: {0}")]
    Io(#[from] std::io::Error),

    #[error("Coordinator fault: {0}")]
    Coordinator(String),

    #[error("Timed out waiting for coordinator ready")]
    StartTimeout,

    #[error("Radio link closed by coordinator")]
    Closed,

    #[error("Session teardown did not complete within {0:?}")]
    DrainTimeout(Duration),
}

/// Contract between the session lifecycle and a coordinator driver.
pub trait RadioDriver {
    /// Start the radio session, forming a new network if requested.
    async fn start(&mut self, form_network: bool) -> Result<(), RadioError>;

    /// Open the join-admission window for `duration_secs` seconds.
    async fn permit_join(&mut self, duration_secs: u16) -> Result<(), RadioError>;

    /// Wait for the next inbound attribute report.
    async fn next_report(&mut self) -> Result<AttributeReport, RadioError>;

    /// Orderly session teardown, releasing the radio handle.
    async fn shutdown(&mut self) -> Result<(), RadioError>;
}

/// Radio session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    Draining,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Stopped => "stopped",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Draining => "draining",
        };
        write!(f, "{}", s)
    }
}

/// Owns session start, the bounded join window, the receive loop, and
/// graceful teardown.
pub struct RadioSessionLifecycle<D> {
    driver: D,
    state: SessionState,
    form_network: bool,
    permit_join_secs: u16,
    drain_grace: Duration,
}

impl<D: RadioDriver> RadioSessionLifecycle<D> {
    pub fn new(driver: D, form_network: bool, permit_join_secs: u16) -> Self {
        Self {
            driver,
            state: SessionState::Stopped,
            form_network,
            permit_join_secs,
            drain_grace: DRAIN_GRACE,
        }
    }

    /// Override the teardown grace period.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session until the shutdown signal fires or the radio faults.
    ///
    /// Every inbound report is handed to `handler` synchronously and to
    /// completion before the next is read; a shutdown signal never
    /// interrupts a report mid-processing.
    pub async fn run<P: MetricPublisher>(
        &mut self,
        handler: &ReportHandler<P>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), RadioError> {
        self.state = SessionState::Starting;
        info!(
            state = %self.state,
            form_network = self.form_network,
            "Starting radio session"
        );
        self.driver.start(self.form_network).await?;

        self.state = SessionState::Running;
        info!(state = %self.state, "Radio session running");

        if self.permit_join_secs > 0 {
            self.driver.permit_join(self.permit_join_secs).await?;
            info!(
                duration_secs = self.permit_join_secs,
                "Join-admission window open"
            );
        }

        let fault = loop {
            tokio::select! {
                result = self.driver.next_report() => match result {
                    Ok(report) => handler.handle(&report),
                    Err(e) => {
                        error!(error = %e, "Radio session fault");
                        break Some(e);
                    }
                },
                changed = shutdown.changed() => {
                    // A dropped sender counts as a shutdown request.
                    if changed.is_err() || *shutdown.borrow() {
                        break None;
                    }
                }
            }
        };

        self.state = SessionState::Draining;
        info!(state = %self.state, "Draining radio session");

        let teardown = timeout(self.drain_grace, self.driver.shutdown()).await;
        if let Ok(Ok(())) = &teardown {
            self.state = SessionState::Stopped;
            info!(state = %self.state, "Radio session stopped");
        }

        // A fault during operation outranks any teardown outcome.
        if let Some(fault) = fault {
            return Err(fault);
        }

        match teardown {
            Ok(result) => result,
            Err(_) => Err(RadioError::DrainTimeout(self.drain_grace)),
        }
    }
}

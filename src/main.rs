//! Prometheus exporter daemon for a Zigbee sensor mesh.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use zigbee_exporter_prometheus::radio::serial::SerialRadio;
use zigbee_exporter_prometheus::radio::sim::SimulatedRadio;
use zigbee_exporter_prometheus::{
    DeviceDirectory, ExporterConfig, HttpServer, MetricStore, RadioDriver, RadioSessionLifecycle,
    ReportHandler, SharedStore,
};

/// Interval between simulated report batches.
const SIMULATED_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Export Zigbee sensor readings as Prometheus metrics.
#[derive(Parser, Debug)]
#[command(name = "zigbee-exporter-prometheus")]
#[command(about = "Export Zigbee sensor-mesh reports as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, default_value = "zigbee.json5")]
    config: PathBuf,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = ExporterConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
        config.validate().context("Invalid listen override")?;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // Initialize logging
    zigbee_exporter_prometheus::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting zigbee-exporter-prometheus");

    // Configuration faults are fatal before the radio session opens.
    if config.devices.is_empty() {
        anyhow::bail!("No devices configured; export mode requires a device list");
    }
    let directory =
        DeviceDirectory::from_entries(&config.devices).context("Invalid device list")?;
    info!(devices = directory.len(), "Device directory loaded");

    let listen_addr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let store: SharedStore = Arc::new(MetricStore::new());
    let handler = ReportHandler::new(directory, store.clone());

    // Shutdown fan-out: signal task flips the watch, everything drains.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(store.clone(), listen_addr, config.prometheus.path.clone());
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, draining...");
        let _ = signal_tx.send(true);
    });

    // The receive loop runs on the main task; reports are handled
    // synchronously, one at a time.
    let session_result = if config.radio.simulate {
        info!("Radio in simulated mode");
        let driver = SimulatedRadio::new(config.devices.clone(), SIMULATED_REPORT_INTERVAL);
        run_session(driver, &config, &handler, shutdown_rx).await
    } else {
        info!(
            device = %config.radio.device,
            baud_rate = config.radio.baud_rate,
            "Listening on radio"
        );
        let driver = SerialRadio::open(&config.radio.device, config.radio.baud_rate)
            .context("Failed to open radio device")?;
        run_session(driver, &config, &handler, shutdown_rx).await
    };

    // Stop the HTTP server even when the radio faulted.
    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    let stats = store.stats();
    info!(
        samples_published = stats.samples_published,
        series = store.series_count(),
        "Final statistics"
    );

    session_result.context("Radio session fault")?;
    info!("Exporter stopped");
    Ok(())
}

async fn run_session<D: RadioDriver>(
    driver: D,
    config: &ExporterConfig,
    handler: &ReportHandler<SharedStore>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), zigbee_exporter_prometheus::RadioError> {
    // The exporter always rejoins the existing mesh; network formation
    // happens through zigbee-permit-join.
    let mut lifecycle = RadioSessionLifecycle::new(driver, false, config.radio.permit_join_secs);
    lifecycle.run(handler, shutdown).await
}

async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                let _ = ctrl_c.await;
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

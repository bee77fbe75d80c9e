//! Open a bounded join-admission window on the mesh.
//!
//! Short-lived companion to the exporter daemon: starts a radio session
//! (forming the network when no persisted mesh state exists yet), permits
//! joins for a fixed duration, then tears the session down.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::timeout;
use tracing::info;

use zigbee_exporter_prometheus::radio::DRAIN_GRACE;
use zigbee_exporter_prometheus::radio::serial::SerialRadio;
use zigbee_exporter_prometheus::{ExporterConfig, RadioDriver};

/// Allow new devices to join the Zigbee mesh.
#[derive(Parser, Debug)]
#[command(name = "zigbee-permit-join")]
#[command(about = "Open a bounded join-admission window on the mesh")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, default_value = "zigbee.json5")]
    config: PathBuf,

    /// Join window duration in seconds.
    #[arg(short, long, default_value_t = 240)]
    duration: u16,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ExporterConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    zigbee_exporter_prometheus::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    // Form a fresh network only when no persisted mesh state exists yet;
    // otherwise rejoin the existing one.
    let form_network = !config.radio.database_path.is_file();

    info!(
        device = %config.radio.device,
        form_network,
        duration_secs = args.duration,
        "Listening on radio, allowing joins"
    );

    let mut driver = SerialRadio::open(&config.radio.device, config.radio.baud_rate)
        .context("Failed to open radio device")?;

    driver
        .start(form_network)
        .await
        .context("Radio session start failed")?;
    driver
        .permit_join(args.duration)
        .await
        .context("Failed to open join window")?;

    info!("Join window open; press Ctrl+C to close early");

    // Hold the session open for the window, still draining inbound frames
    // so the coordinator link does not back up.
    let window = tokio::time::sleep(Duration::from_secs(args.duration as u64));
    tokio::pin!(window);

    let mut session_fault = None;
    loop {
        tokio::select! {
            _ = &mut window => {
                info!("Join window elapsed");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing join window");
                break;
            }
            result = driver.next_report() => {
                if let Err(e) = result {
                    session_fault = Some(e);
                    break;
                }
            }
        }
    }

    info!("Shutting down radio session");
    let teardown = timeout(DRAIN_GRACE, driver.shutdown()).await;

    // A fault during the window outranks any teardown outcome.
    if let Some(fault) = session_fault {
        return Err(fault).context("Radio session fault during join window");
    }

    match teardown {
        Ok(result) => result.context("Radio session teardown failed")?,
        Err(_) => anyhow::bail!("Radio session teardown timed out after {:?}", DRAIN_GRACE),
    }

    info!("Done");
    Ok(())
}

//! argus: streams hardware-encoded camera frames to a remote endpoint.

use std::path::Path;

use argus::capture::V4l2Camera;
use argus::channel::WsChannel;
use argus::net::TcpProbeGate;
use argus::{utils, Config, StreamError, Streamer};
use color_eyre::Result;
use tokio::sync::watch;
use tracing::{error, info};

/// Exit status when the camera peripheral rejects initialization.
const EXIT_CAMERA_INIT: i32 = 2;
/// Exit status when the network never becomes ready.
const EXIT_NETWORK_TIMEOUT: i32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "argus=info".into()),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("argus launching");

    // Provisioned configuration, opened once at startup
    let config_path = std::env::var("ARGUS_CONFIG").unwrap_or_else(|_| "argus.toml".into());
    let mut config = Config::load(Path::new(&config_path))?;

    // Auto-detect capture device if needed
    if config.camera.device.is_empty() {
        match utils::auto_detect_device() {
            Ok(path) => config.camera.device = path,
            Err(e) => {
                error!("{e}");
                std::process::exit(EXIT_CAMERA_INIT);
            }
        }
    }
    info!("using capture device {}", config.camera.device);

    let gate = TcpProbeGate::new(&config.network);
    let camera = V4l2Camera::new(config.camera.clone());
    let channel = WsChannel::new(&config.channel);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let streamer = Streamer::new(gate, camera, channel, &config, shutdown_rx);
    match streamer.run().await {
        Ok(()) => {
            info!("argus shutting down");
            Ok(())
        }
        Err(e @ StreamError::Camera(_)) => {
            error!("{e}");
            std::process::exit(EXIT_CAMERA_INIT);
        }
        Err(e @ StreamError::Gate(_)) => {
            error!("{e}");
            std::process::exit(EXIT_NETWORK_TIMEOUT);
        }
    }
}

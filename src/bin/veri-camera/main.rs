//! Veri Camera Binary
//!
//! Joins Wi-Fi, brings up the camera, then every few seconds captures a JPEG,
//! posts it to the relay and logs the description that comes back.
//!
//! ## Usage
//!
//! ```bash
//! export VERI_WIFI_SSID=lab VERI_WIFI_PASSWORD=secret
//! export VERI_VISION_ENDPOINT=http://192.168.0.10:8000/analyze
//!
//! # Run with real camera (Pi)
//! veri-camera
//!
//! # Run with test source (development, no Wi-Fi or camera needed)
//! veri-camera --test-source
//! ```

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use veri_cam::{
    capture::{LibcameraStill, TestPatternCamera},
    network::{NmcliStation, SimulatedStation},
    CameraDriver, CameraResource, CaptureLoop, DeviceConfig, NetworkAssociationManager,
    RelayClient, StationInterface,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("veri_cam=info".parse()?),
        )
        .init();

    let mut config = DeviceConfig::from_env()?;
    let test_source = std::env::args().any(|arg| arg == "--test-source");

    info!("Veri Camera starting");
    info!("  Endpoint: {}", config.relay.endpoint);
    info!("  Interval: {}s", config.interval.as_secs());
    info!("  Source: {}", if test_source { "test pattern" } else { "libcamera" });

    let relay = RelayClient::new(config.relay.clone())?;

    if test_source {
        if config.wifi.ssid.is_empty() {
            config.wifi.ssid = "simulated".to_string();
        }
        let network = NetworkAssociationManager::new(SimulatedStation::new(2), config.wifi);
        let camera = CameraResource::new(TestPatternCamera::new());
        run(CaptureLoop::new(network, camera, relay, config.interval)).await
    } else {
        let network = NetworkAssociationManager::new(NmcliStation::default(), config.wifi);
        let camera = CameraResource::new(LibcameraStill::default());
        run(CaptureLoop::new(network, camera, relay, config.interval)).await
    }
}

async fn run<S: StationInterface, D: CameraDriver>(mut device: CaptureLoop<S, D>) -> Result<()> {
    // Without a network or a camera there is nothing useful to do: halt
    if let Err(e) = device.start().await {
        error!(error = %e, "Startup failed, halting");
        return Err(e).context("Device startup failed");
    }

    tokio::select! {
        _ = device.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Shutting down...");
        }
    }

    if let Err(e) = device.shutdown().await {
        warn!(error = %e, "Failed to release camera");
    }
    Ok(())
}

//! Veri - edge camera that asks a vision model what it sees
//!
//! A camera device captures a JPEG every few seconds, posts it over Wi-Fi to a
//! relay service, and the relay forwards it to a vision provider that answers
//! with a short description. Feature flags control which side is compiled:
//!
//! - **Core types** (always available): Frame, protocol constants, configuration
//! - **`device`**: Wi-Fi association, camera lifecycle, relay client, capture loop
//! - **`server`**: `/analyze` relay service and the `/infer` detection service
//!
//! # Example - Device
//!
//! ```ignore
//! use veri_cam::{CaptureLoop, DeviceConfig};
//!
//! let config = DeviceConfig::from_env()?;
//! let mut device = CaptureLoop::new(network, camera, relay, config.interval);
//! device.start().await?;
//! device.run().await;
//! ```
//!
//! # Example - Relay
//!
//! ```ignore
//! use veri_cam::server::{self, OpenAiProvider};
//!
//! let config = RelayServiceConfig::from_env()?;
//! let provider = OpenAiProvider::new(config.provider.clone())?;
//! server::relay::serve(config, provider).await?;
//! ```

// Core modules (always compiled)
pub mod config;
mod error;
mod frame;
mod protocol;

pub use config::{DeviceConfig, InferConfig, RelayServiceConfig};
pub use frame::Frame;
pub use protocol::*;

// Device: Wi-Fi association, camera, relay client, capture loop
#[cfg(feature = "device")]
pub mod capture;
#[cfg(feature = "device")]
pub mod client;
#[cfg(feature = "device")]
pub mod device;
#[cfg(feature = "device")]
pub mod network;

#[cfg(feature = "device")]
pub use capture::{CameraDriver, CameraProfile, CameraResource, CaptureError, HardwareError};
#[cfg(feature = "device")]
pub use client::{Description, RelayClient, RelayError};
#[cfg(feature = "device")]
pub use device::{
    CaptureLoop, CycleOutcome, CyclePhase, CycleReport, StartupError, REPORT_QUEUE_CAPACITY,
};
#[cfg(feature = "device")]
pub use network::{
    backoff_delays, AssociationError, AssociationState, Backoff, BackoffPolicy,
    NetworkAssociationManager, StationInterface,
};

// Server: relay service and inference reference service
#[cfg(feature = "server")]
pub mod server;

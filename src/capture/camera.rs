//! Camera resource lifecycle and capture retry policy

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::Frame;

/// Peripheral init/deinit failures
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Deinit or grab on a camera that was never configured
    #[error("camera not initialized")]
    NotInitialized,

    #[error("camera driver error: {0}")]
    Driver(String),

    #[error("camera I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// No usable frame from the camera
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },

    #[error("camera not initialized")]
    NotInitialized,
}

/// Sensor frame sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    /// 320x240
    Qvga,
    /// 640x480
    Vga,
    /// 1280x720
    Hd,
}

impl FrameSize {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            FrameSize::Qvga => (320, 240),
            FrameSize::Vga => (640, 480),
            FrameSize::Hd => (1280, 720),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialEffect {
    None,
    Grayscale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteBalance {
    Auto,
    Daylight,
    Cloudy,
    Indoor,
}

impl WhiteBalance {
    pub fn as_str(self) -> &'static str {
        match self {
            WhiteBalance::Auto => "auto",
            WhiteBalance::Daylight => "daylight",
            WhiteBalance::Cloudy => "cloudy",
            WhiteBalance::Indoor => "indoor",
        }
    }
}

/// Sensor configuration applied on every `init`.
///
/// Levels are in sensor steps (-2..=2, 0 is neutral). `quality` follows the
/// ESP32 JPEG scale: 0-63, lower is higher fidelity.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraProfile {
    pub sensor_id: u8,
    pub frame_size: FrameSize,
    pub effect: SpecialEffect,
    pub white_balance: WhiteBalance,
    pub saturation: i8,
    pub brightness: i8,
    pub contrast: i8,
    pub quality: u8,
}

impl Default for CameraProfile {
    /// Conservative profile: small frames, no effects, auto white balance,
    /// neutral levels, quality 10 for good fidelity at moderate size
    fn default() -> Self {
        Self {
            sensor_id: 0,
            frame_size: FrameSize::Qvga,
            effect: SpecialEffect::None,
            white_balance: WhiteBalance::Auto,
            saturation: 0,
            brightness: 0,
            contrast: 0,
            quality: 10,
        }
    }
}

impl CameraProfile {
    /// `quality` mapped onto the 1-100 (higher is better) scale used by most encoders
    pub fn jpeg_quality_percent(&self) -> u8 {
        let q = u32::from(self.quality.min(63));
        (100 - q * 100 / 63).clamp(1, 100) as u8
    }
}

/// Bounded retry schedule for `capture`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRetry {
    pub attempts: u32,
    /// Sleep after failed attempt `n` is `step * n`
    pub step: Duration,
}

impl Default for CaptureRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            step: Duration::from_millis(200),
        }
    }
}

/// Camera peripheral driver. Holds the hardware handle.
#[async_trait::async_trait]
pub trait CameraDriver: Send {
    /// Configure the sensor and acquire the handle
    async fn init(&mut self, profile: &CameraProfile) -> Result<(), HardwareError>;

    /// Release the handle. `HardwareError::NotInitialized` when there is none.
    async fn deinit(&mut self) -> Result<(), HardwareError>;

    /// Pull one encoded frame. `None` or an empty buffer means no frame this time.
    async fn grab(&mut self) -> Result<Option<Bytes>, HardwareError>;
}

/// Sole owner of the camera driver and its handle
pub struct CameraResource<D> {
    driver: D,
    profile: CameraProfile,
    retry: CaptureRetry,
    initialized: bool,
}

impl<D: CameraDriver> CameraResource<D> {
    pub fn new(driver: D) -> Self {
        Self::with_profile(driver, CameraProfile::default())
    }

    pub fn with_profile(driver: D, profile: CameraProfile) -> Self {
        Self {
            driver,
            profile,
            retry: CaptureRetry::default(),
            initialized: false,
        }
    }

    pub fn with_retry(mut self, retry: CaptureRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn profile(&self) -> &CameraProfile {
        &self.profile
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Reset the peripheral and configure it.
    ///
    /// A previous run may have exited without releasing the camera, so the
    /// driver is always deinitialised first. That reset never blocks init.
    pub async fn init(&mut self) -> Result<(), HardwareError> {
        match self.driver.deinit().await {
            Ok(()) => debug!("Released stale camera handle"),
            Err(HardwareError::NotInitialized) => {}
            Err(e) => warn!(error = %e, "Camera reset failed, initialising anyway"),
        }
        self.initialized = false;

        self.driver.init(&self.profile).await?;
        self.initialized = true;

        let (width, height) = self.profile.frame_size.dimensions();
        info!(
            sensor = self.profile.sensor_id,
            width,
            height,
            quality = self.profile.quality,
            "Camera initialised"
        );
        Ok(())
    }

    /// Release the camera. No-op when not initialised.
    pub async fn deinit(&mut self) -> Result<(), HardwareError> {
        if !self.initialized {
            return Ok(());
        }
        // The handle is gone either way; the next init resets defensively
        self.initialized = false;
        match self.driver.deinit().await {
            Ok(()) | Err(HardwareError::NotInitialized) => {
                info!("Camera released");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Capture one JPEG frame, retrying transient sensor failures.
    ///
    /// Gives up after `retry.attempts`; retrying further is the caller's call.
    pub async fn capture(&mut self) -> Result<Frame, CaptureError> {
        if !self.initialized {
            return Err(CaptureError::NotInitialized);
        }

        for attempt in 1..=self.retry.attempts {
            match self.driver.grab().await {
                Ok(Some(buf)) if !buf.is_empty() => return Ok(Frame::new(buf)),
                Ok(_) => debug!(attempt, "Camera returned an empty buffer"),
                Err(e) => warn!(attempt, error = %e, "Camera grab failed"),
            }
            tokio::time::sleep(self.retry.step * attempt).await;
        }

        Err(CaptureError::Unavailable {
            attempts: self.retry.attempts,
        })
    }
}

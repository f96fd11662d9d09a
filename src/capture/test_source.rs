//! Synthetic camera for development without hardware
//!
//! Produces real JPEG frames (a moving gradient) at the profile's resolution.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use super::camera::{CameraDriver, CameraProfile, HardwareError};

/// Camera driver that renders a test pattern
#[derive(Debug, Default)]
pub struct TestPatternCamera {
    active: Option<CameraProfile>,
    frame_index: u32,
}

impl TestPatternCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

fn render(profile: &CameraProfile, frame_index: u32) -> Result<Vec<u8>, HardwareError> {
    let (width, height) = profile.frame_size.dimensions();
    let shift = frame_index.wrapping_mul(8);
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x + shift) % 256) as u8,
            ((y + shift) % 256) as u8,
            ((x + y) / 4 % 256) as u8,
        ])
    });

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, profile.jpeg_quality_percent())
        .encode_image(&image)
        .map_err(|e| HardwareError::Driver(format!("test pattern encode failed: {}", e)))?;
    Ok(jpeg)
}

#[async_trait::async_trait]
impl CameraDriver for TestPatternCamera {
    async fn init(&mut self, profile: &CameraProfile) -> Result<(), HardwareError> {
        self.active = Some(profile.clone());
        self.frame_index = 0;
        Ok(())
    }

    async fn deinit(&mut self) -> Result<(), HardwareError> {
        self.active
            .take()
            .map(|_| ())
            .ok_or(HardwareError::NotInitialized)
    }

    async fn grab(&mut self) -> Result<Option<Bytes>, HardwareError> {
        let profile = self.active.as_ref().ok_or(HardwareError::NotInitialized)?;
        let jpeg = render(profile, self.frame_index)?;
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(Some(Bytes::from(jpeg)))
    }
}

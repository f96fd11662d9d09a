//! Still capture using libcamera-still (Pi camera)
//!
//! Each grab spawns one `libcamera-still` process that writes a single JPEG
//! to stdout. The "handle" is the validated profile; init checks that the
//! sensor is actually present.

use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use tokio::process::Command;
use tracing::debug;

use super::camera::{CameraDriver, CameraProfile, HardwareError, SpecialEffect};

/// libcamera-backed camera driver
#[derive(Debug)]
pub struct LibcameraStill {
    program: String,
    /// Upper bound for one still capture
    timeout: Duration,
    active: Option<CameraProfile>,
}

impl Default for LibcameraStill {
    fn default() -> Self {
        Self {
            program: "libcamera-still".to_string(),
            timeout: Duration::from_secs(10),
            active: None,
        }
    }
}

impl LibcameraStill {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }
}

/// Command-line arguments producing one JPEG on stdout for `profile`
pub fn still_args(profile: &CameraProfile) -> Vec<String> {
    let (width, height) = profile.frame_size.dimensions();
    let saturation = match profile.effect {
        SpecialEffect::Grayscale => 0.0,
        SpecialEffect::None => 1.0 + f32::from(profile.saturation) * 0.25,
    };

    vec![
        "--nopreview".to_string(),
        "--immediate".to_string(),
        "--camera".to_string(),
        profile.sensor_id.to_string(),
        "--width".to_string(),
        width.to_string(),
        "--height".to_string(),
        height.to_string(),
        "--encoding".to_string(),
        "jpg".to_string(),
        "--quality".to_string(),
        profile.jpeg_quality_percent().to_string(),
        "--awb".to_string(),
        profile.white_balance.as_str().to_string(),
        "--saturation".to_string(),
        format!("{:.2}", saturation),
        "--brightness".to_string(),
        format!("{:.2}", f32::from(profile.brightness) * 0.25),
        "--contrast".to_string(),
        format!("{:.2}", 1.0 + f32::from(profile.contrast) * 0.25),
        "--output".to_string(),
        "-".to_string(), // Output to stdout
    ]
}

#[async_trait::async_trait]
impl CameraDriver for LibcameraStill {
    async fn init(&mut self, profile: &CameraProfile) -> Result<(), HardwareError> {
        let output = Command::new(&self.program)
            .arg("--list-cameras")
            .output()
            .await?;

        let listing = String::from_utf8_lossy(&output.stdout);
        let marker = format!("{} :", profile.sensor_id);
        if !listing.lines().any(|l| l.trim_start().starts_with(&marker)) {
            return Err(HardwareError::Driver(format!(
                "camera {} not found by {}",
                profile.sensor_id, self.program
            )));
        }

        self.active = Some(profile.clone());
        Ok(())
    }

    async fn deinit(&mut self) -> Result<(), HardwareError> {
        match self.active.take() {
            Some(_) => Ok(()),
            None => Err(HardwareError::NotInitialized),
        }
    }

    async fn grab(&mut self) -> Result<Option<Bytes>, HardwareError> {
        let profile = self.active.as_ref().ok_or(HardwareError::NotInitialized)?;
        let args = still_args(profile);
        debug!("libcamera-still args: {:?}", args);

        let child = Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| HardwareError::Driver("still capture timed out".into()))??;

        if !output.status.success() {
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "libcamera-still failed"
            );
            return Ok(None);
        }
        Ok(Some(Bytes::from(output.stdout)))
    }
}

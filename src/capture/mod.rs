//! Camera capture
//!
//! This module owns the camera peripheral:
//! - `CameraResource`: init/deinit lifecycle and single-shot capture with bounded retries
//! - `LibcameraStill`: still capture via libcamera (Pi camera)
//! - `TestPatternCamera`: synthetic JPEG frames for development without hardware

pub mod camera;
pub mod libcamera;
pub mod test_source;

// Re-export commonly used types
pub use camera::{
    CameraDriver, CameraProfile, CameraResource, CaptureError, CaptureRetry, FrameSize,
    HardwareError, SpecialEffect, WhiteBalance,
};
pub use libcamera::LibcameraStill;
pub use test_source::TestPatternCamera;

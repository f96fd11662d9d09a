//! Captured JPEG frame

use bytes::Bytes;

/// One JPEG-encoded image pulled from the camera.
///
/// Frames are immutable. The payload is reference counted so the relay
/// client can hand it to the HTTP body without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Wrap an encoded JPEG buffer
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Encoded JPEG bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Size of the encoded image in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Whether the payload starts with the JPEG SOI marker
    pub fn looks_like_jpeg(&self) -> bool {
        self.payload.starts_with(&JPEG_SOI)
    }
}

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

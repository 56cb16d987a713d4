use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// One captured, hardware-encoded frame.
///
/// Handed out by [`FrameSource::acquire`](crate::FrameSource::acquire) and
/// owned exclusively by the streaming loop until it is passed back through
/// `release`. Release consumes the buffer, so a slot can never be returned
/// twice.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Encoded image data, exactly as produced by the peripheral's encoder.
    pub data: Bytes,

    /// Monotonic capture sequence number.
    pub seq: u64,

    /// Acquisition timestamp for latency tracking.
    pub captured_at: Instant,
}

impl FrameBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Output formats of the peripheral's encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Jpeg,
    Yuv422,
    Grayscale,
    Rgb565,
}

impl PixelFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Jpeg => "JPEG",
            PixelFormat::Yuv422 => "YUV422",
            PixelFormat::Grayscale => "GRAYSCALE",
            PixelFormat::Rgb565 => "RGB565",
        }
    }
}

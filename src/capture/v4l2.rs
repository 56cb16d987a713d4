//! V4L2-backed frame source.
//!
//! The sensor's hardware encoder produces the wire payload; this module
//! only moves encoded buffers out of the driver's pool and accounts for
//! the slots the rest of the pipeline holds.

use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info, instrument, trace};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::control::{Control, Value};
use v4l::io::traits::CaptureStream;
use v4l::prelude::{MmapStream, UserptrStream};
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::frame::{FrameBuffer, PixelFormat};
use crate::error::CameraError;
use crate::{BufferPlacement, CameraConfig, GrabPolicy};

const V4L2_CID_JPEG_COMPRESSION_QUALITY: u32 = 0x009d_0903;

/// Production frame source driving a V4L2 capture device.
pub struct V4l2Camera {
    config: CameraConfig,
    _device: Option<Box<Device>>, // keeps the fd open for the stream's lifetime
    stream: Option<Stream>,
    pool_slots: u32,
    outstanding: u32,
    sequence: u64,
}

enum Stream {
    Mmap(MmapStream<'static>),
    Userptr(UserptrStream),
}

impl Stream {
    fn next(&mut self) -> std::io::Result<&[u8]> {
        match self {
            Stream::Mmap(s) => s.next().map(|(buf, _)| buf),
            Stream::Userptr(s) => s.next().map(|(buf, _)| buf),
        }
    }
}

impl V4l2Camera {
    pub fn new(config: CameraConfig) -> Self {
        let pool_slots = effective_buffers(config.grab, config.buffer_count);
        Self {
            config,
            _device: None,
            stream: None,
            pool_slots,
            outstanding: 0,
            sequence: 0,
        }
    }
}

#[async_trait::async_trait]
impl crate::FrameSource for V4l2Camera {
    fn init(&mut self) -> Result<(), CameraError> {
        info!(
            xclk_hz = self.config.xclk_hz,
            "bringing up sensor, pinout {:?}", self.config.pinout
        );

        let device = Device::with_path(&self.config.device).map_err(|e| CameraError::Open {
            path: self.config.device.clone(),
            source: e,
        })?;

        let caps = device.query_caps().map_err(CameraError::Init)?;
        info!("device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(CameraError::NotACaptureDevice);
        }

        let mut fmt = device.format().map_err(CameraError::Init)?;
        fmt.width = self.config.width;
        fmt.height = self.config.height;
        fmt.fourcc = match self.config.format {
            PixelFormat::Jpeg => FourCC::new(b"MJPG"),
            PixelFormat::Yuv422 => FourCC::new(b"YUYV"),
            PixelFormat::Grayscale => FourCC::new(b"GREY"),
            PixelFormat::Rgb565 => FourCC::new(b"RGBP"),
        };
        // The driver reports the format it actually applied.
        let applied = device.set_format(&fmt).map_err(CameraError::Init)?;
        if applied.fourcc != fmt.fourcc {
            return Err(CameraError::UnsupportedFormat(self.config.format.as_str()));
        }

        if self.config.format == PixelFormat::Jpeg {
            // Best effort: many UVC drivers do not expose the control.
            let quality = encoder_quality_to_driver(self.config.jpeg_quality);
            if let Err(e) = device.set_control(Control {
                id: V4L2_CID_JPEG_COMPRESSION_QUALITY,
                value: Value::Integer(quality),
            }) {
                debug!("driver has no jpeg quality control: {}", e);
            }
        }

        let stream = match self.config.placement {
            BufferPlacement::DeviceMmap => Stream::Mmap(
                MmapStream::with_buffers(&device, Type::VideoCapture, self.pool_slots)
                    .map_err(CameraError::Init)?,
            ),
            BufferPlacement::UserMemory => Stream::Userptr(
                UserptrStream::with_buffers(&device, Type::VideoCapture, self.pool_slots)
                    .map_err(CameraError::Init)?,
            ),
        };

        self._device = Some(Box::new(device));
        self.stream = Some(stream);
        info!("capture stream started with {} buffers", self.pool_slots);
        Ok(())
    }

    /// Dequeue the next encoded frame. Blocks for at most one hardware
    /// frame time while the sensor finishes its scan.
    #[instrument(skip(self))]
    async fn acquire(&mut self) -> Result<Option<FrameBuffer>, CameraError> {
        if self.outstanding >= self.pool_slots {
            trace!("all {} buffer slots outstanding", self.pool_slots);
            return Ok(None);
        }

        let stream = self.stream.as_mut().ok_or(CameraError::NotStarted)?;
        let buf = stream.next().map_err(CameraError::Acquire)?;
        let data = Bytes::copy_from_slice(buf);

        self.sequence += 1;
        self.outstanding += 1;

        Ok(Some(FrameBuffer {
            data,
            seq: self.sequence,
            captured_at: Instant::now(),
        }))
    }

    fn release(&mut self, frame: FrameBuffer) {
        drop(frame);
        self.outstanding = self.outstanding.saturating_sub(1);
    }
}

/// V4L2 has no dequeue-newest call, so `Latest` runs the stream with a
/// single buffer: with one slot the dequeued frame is always the freshest.
fn effective_buffers(grab: GrabPolicy, configured: u32) -> u32 {
    match grab {
        GrabPolicy::WhenEmpty => configured.max(1),
        GrabPolicy::Latest => 1,
    }
}

/// Map the 0-63 encoder quality scale (lower = better) onto the driver's
/// 1-100 percent scale (higher = better).
fn encoder_quality_to_driver(quality: u8) -> i64 {
    let q = i64::from(quality.min(63));
    (100 - (q * 99) / 63).clamp(1, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_scale_endpoints() {
        assert_eq!(encoder_quality_to_driver(0), 100);
        assert_eq!(encoder_quality_to_driver(63), 1);
        assert_eq!(encoder_quality_to_driver(200), 1);
    }

    #[test]
    fn quality_scale_is_monotonic() {
        let mut prev = encoder_quality_to_driver(0);
        for q in 1..=63 {
            let cur = encoder_quality_to_driver(q);
            assert!(cur <= prev, "quality {} mapped above quality {}", q, q - 1);
            prev = cur;
        }
    }

    #[test]
    fn latest_grab_uses_single_buffer() {
        assert_eq!(effective_buffers(GrabPolicy::Latest, 4), 1);
        assert_eq!(effective_buffers(GrabPolicy::WhenEmpty, 4), 4);
        assert_eq!(effective_buffers(GrabPolicy::WhenEmpty, 0), 1);
    }
}

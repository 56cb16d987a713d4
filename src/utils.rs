use tracing::info;
use v4l::{capability::Flags, video::Capture, Device, FourCC};

use crate::error::CameraError;

/// Auto-detect the best capture device.
///
/// Scans `/dev/video0..9` and prefers devices whose driver can hand out
/// hardware-encoded JPEG; the channel ships whatever the encoder produces,
/// so an encoding device keeps the CPU out of the hot path.
pub fn auto_detect_device() -> Result<String, CameraError> {
    use std::path::Path;

    info!("auto-detecting capture devices");

    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            continue;
        }

        if let Ok(formats) = dev.enum_formats() {
            if formats.iter().any(|fmt| fmt.fourcc == FourCC::new(b"MJPG")) {
                info!("found JPEG-capable device: {} - {}", path, caps.card);
                return Ok(path);
            }
        }
    }

    Err(CameraError::NoDevice)
}

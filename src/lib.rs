pub mod capture;
pub mod channel;
pub mod error;
pub mod net;
pub mod pipeline;
pub mod testing;
pub mod utils;

use std::path::Path;
use std::time::Duration;

use capture::frame::PixelFormat;
use serde::{Deserialize, Serialize};

pub use capture::{FrameBuffer, FrameSource};
pub use channel::{MessageChannel, SendPolicy};
pub use error::{CameraError, ChannelError, GateError, StreamError};
pub use net::ConnectivityGate;
pub use pipeline::{RateMonitor, Streamer};

/// System configuration, loaded once at startup from the provisioning file
/// and environment overlay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub channel: ChannelConfig,
    pub network: NetworkConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from `path` (optional file) with `ARGUS__*`
    /// environment overrides. Missing file and missing keys fall back to
    /// the hardware-revision defaults.
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("ARGUS").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture device path; empty string means auto-detect.
    pub device: String,
    /// Sensor wiring for this hardware revision.
    pub pinout: SensorPinout,
    /// Sensor master clock in Hz. 20MHz, or 10MHz for double FPS on some
    /// OV sensors (experimental).
    pub xclk_hz: u32,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// 0-63, lower number means higher quality.
    pub jpeg_quality: u8,
    /// Frame buffer pool slots owned by the peripheral.
    pub buffer_count: u32,
    pub placement: BufferPlacement,
    pub grab: GrabPolicy,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            pinout: SensorPinout::wrover_kit(),
            xclk_hz: 20_000_000,
            format: PixelFormat::Jpeg,
            width: 800,
            height: 600,
            jpeg_quality: 12,
            buffer_count: 1,
            placement: BufferPlacement::DeviceMmap,
            grab: GrabPolicy::WhenEmpty,
        }
    }
}

/// DVP sensor pin assignments. `None` marks a line that is not wired on
/// this revision. On embedded-Linux boards the device tree owns the wiring;
/// the record is logged at init for field diagnostics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorPinout {
    pub pwdn: Option<u8>,
    pub reset: Option<u8>,
    pub xclk: u8,
    pub sccb_sda: u8,
    pub sccb_scl: u8,
    pub data: [u8; 8],
    pub vsync: u8,
    pub href: u8,
    pub pclk: u8,
}

impl SensorPinout {
    /// Wiring of the WROVER-KIT hardware revision.
    pub const fn wrover_kit() -> Self {
        Self {
            pwdn: None,
            reset: None, // software reset is performed instead
            xclk: 21,
            sccb_sda: 26,
            sccb_scl: 27,
            data: [4, 5, 18, 19, 36, 39, 34, 35],
            vsync: 25,
            href: 23,
            pclk: 22,
        }
    }
}

impl Default for SensorPinout {
    fn default() -> Self {
        Self::wrover_kit()
    }
}

/// Where the peripheral places its frame buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferPlacement {
    /// Driver-owned memory mapped into the process.
    DeviceMmap,
    /// Caller-supplied buffers.
    UserMemory,
}

/// Buffer acquisition policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrabPolicy {
    /// Fill buffers in order as they free up.
    WhenEmpty,
    /// Always hand out the freshest frame.
    Latest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Remote endpoint URI, e.g. `ws://host:port/stream`.
    pub endpoint: String,
    /// Upper bound for a blocking send before the frame is dropped.
    pub send_timeout_ms: u64,
    /// Outbound message queue depth.
    pub queue_depth: usize,
    /// Delay before the channel redials after a connection error.
    pub reconnect_delay_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8080".into(),
            send_timeout_ms: 100,
            queue_depth: 4,
            reconnect_delay_ms: 1000,
        }
    }
}

impl ChannelConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address probed for reachability before streaming starts.
    pub probe_addr: String,
    pub probe_interval_ms: u64,
    /// How long to wait for connectivity before giving up.
    pub ready_timeout_ms: u64,
    /// Grace period after connectivity comes up, before touching hardware.
    pub settle_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_addr: "1.1.1.1:53".into(),
            probe_interval_ms: 500,
            ready_timeout_ms: 30_000,
            settle_ms: 1000,
        }
    }
}

impl NetworkConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fixed sleep between loop iterations. 67ms caps throughput near 15 fps.
    pub pacing_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { pacing_ms: 67 }
    }
}

impl PipelineConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hardware_revision() {
        let config = Config::default();
        assert_eq!(config.camera.jpeg_quality, 12);
        assert_eq!(config.camera.buffer_count, 1);
        assert_eq!(config.camera.pinout.xclk, 21);
        assert_eq!(config.pipeline.pacing(), Duration::from_millis(67));
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/argus.toml")).unwrap();
        assert_eq!(config.camera.width, 800);
        assert_eq!(config.camera.height, 600);
        assert_eq!(config.channel.queue_depth, 4);
    }
}

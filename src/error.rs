//! Error types for the streaming pipeline.

use std::time::Duration;

/// Connectivity gate failures.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Network never became ready within the configured deadline.
    #[error("network not ready within {0:?}")]
    ReadyTimeout(Duration),
}

/// Frame source failures. Everything surfaced by `init` is fatal for the
/// process; `Acquire` is transient and absorbed by the streaming loop.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("failed to open capture device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no suitable capture device found")]
    NoDevice,

    #[error("device does not support video capture")]
    NotACaptureDevice,

    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(&'static str),

    #[error("peripheral rejected configuration: {0}")]
    Init(#[source] std::io::Error),

    #[error("capture stream not started")]
    NotStarted,

    #[error("frame acquisition failed: {0}")]
    Acquire(#[source] std::io::Error),
}

/// Delivery channel failures. All recoverable; a failed send is a dropped
/// frame, never a stall.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Guarded precondition, not a transport fault.
    #[error("channel is not connected")]
    NotConnected,

    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    #[error("outbound queue full")]
    QueueFull,

    #[error("channel closed")]
    Closed,
}

/// The only errors the streaming loop propagates to the caller.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("camera initialization failed: {0}")]
    Camera(#[from] CameraError),
}

pub mod frame;
pub mod v4l2;

use async_trait::async_trait;

use crate::error::CameraError;

pub use frame::FrameBuffer;
pub use frame::PixelFormat;
pub use v4l2::V4l2Camera;

/// Camera peripheral lifecycle: configuration, initialization, and frame
/// buffer acquisition/release against a fixed-size pool.
#[async_trait]
pub trait FrameSource: Send {
    /// Apply the fixed configuration to the peripheral. Failure here is
    /// fatal for the whole process; streaming cannot proceed without a
    /// frame source.
    fn init(&mut self) -> Result<(), CameraError>;

    /// Block for at most one hardware frame time and return the next
    /// buffer. `Ok(None)` means nothing was available this cycle (pool
    /// exhausted or peripheral busy); the caller retries on its own
    /// cadence.
    async fn acquire(&mut self) -> Result<Option<FrameBuffer>, CameraError>;

    /// Return a buffer's slot to the peripheral's pool. Consumes the
    /// buffer; the pool stalls if a caller leaks one instead.
    fn release(&mut self, frame: FrameBuffer);
}

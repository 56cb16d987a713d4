pub mod ws;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ChannelError;

pub use ws::WsChannel;

/// Backpressure policy for a single send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPolicy {
    /// Fail immediately when the transport has no buffer space.
    NoWait,
    /// Suspend up to the given bound; expiry means the frame is dropped.
    Wait(Duration),
}

/// Persistent duplex connection carrying discrete binary messages.
///
/// Connection management runs on a background task owned by the
/// implementation; callers only query liveness and issue sends. Callers
/// must not call [`send_binary`](MessageChannel::send_binary) while
/// [`is_connected`](MessageChannel::is_connected) is false; frames
/// produced while disconnected are dropped, not queued.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Begin an asynchronous connection attempt. Returns immediately;
    /// state transitions happen on the implementation's own task.
    fn connect(&self);

    /// Non-blocking liveness query.
    fn is_connected(&self) -> bool;

    /// Enqueue one binary message.
    async fn send_binary(&self, payload: Bytes, policy: SendPolicy) -> Result<(), ChannelError>;

    /// Tear the connection down and stop the background task.
    async fn close(&mut self) -> Result<(), ChannelError>;
}

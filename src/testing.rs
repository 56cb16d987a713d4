//! Testing doubles for the pipeline collaborators.
//!
//! The mocks record every interaction so tests can assert on buffer
//! discipline, liveness guarding, and delivery outcomes. All of them are
//! cheap clones over shared state: keep one handle in the test while the
//! streamer owns another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;

use crate::capture::{FrameBuffer, FrameSource};
use crate::channel::{MessageChannel, SendPolicy};
use crate::error::{CameraError, ChannelError, GateError};
use crate::net::ConnectivityGate;

/// Gate that is either immediately ready or never becomes ready.
#[derive(Clone)]
pub struct MockGate {
    ready: bool,
}

impl MockGate {
    pub fn ready() -> Self {
        Self { ready: true }
    }

    pub fn never_ready() -> Self {
        Self { ready: false }
    }
}

#[async_trait]
impl ConnectivityGate for MockGate {
    async fn await_ready(&self, deadline: Duration) -> Result<(), GateError> {
        if self.ready {
            Ok(())
        } else {
            Err(GateError::ReadyTimeout(deadline))
        }
    }
}

/// Frame source with scripted frames and single-digit pool accounting.
#[derive(Clone)]
pub struct MockCamera {
    inner: Arc<Mutex<CameraState>>,
}

struct CameraState {
    frames: VecDeque<Bytes>,
    slots: usize,
    outstanding: usize,
    acquired: usize,
    released: usize,
    starved: usize,
    fail_init: bool,
    initialized: bool,
    sequence: u64,
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CameraState {
                frames: VecDeque::new(),
                slots: 1,
                outstanding: 0,
                acquired: 0,
                released: 0,
                starved: 0,
                fail_init: false,
                initialized: false,
                sequence: 0,
            })),
        }
    }

    /// Script the frames handed out, in order.
    pub fn with_frames<I>(self, frames: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        self.inner.lock().unwrap().frames = frames.into_iter().collect();
        self
    }

    /// Size of the peripheral's buffer pool (default 1).
    pub fn with_slots(self, slots: usize) -> Self {
        self.inner.lock().unwrap().slots = slots;
        self
    }

    /// Make `init` fail, simulating an absent or misconfigured peripheral.
    pub fn failing_init(self) -> Self {
        self.inner.lock().unwrap().fail_init = true;
        self
    }

    pub fn acquired(&self) -> usize {
        self.inner.lock().unwrap().acquired
    }

    pub fn released(&self) -> usize {
        self.inner.lock().unwrap().released
    }

    pub fn outstanding(&self) -> usize {
        self.inner.lock().unwrap().outstanding
    }

    /// Times an acquisition found no free pool slot.
    pub fn starved(&self) -> usize {
        self.inner.lock().unwrap().starved
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for MockCamera {
    fn init(&mut self) -> Result<(), CameraError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_init {
            return Err(CameraError::NotACaptureDevice);
        }
        state.initialized = true;
        Ok(())
    }

    async fn acquire(&mut self) -> Result<Option<FrameBuffer>, CameraError> {
        let mut state = self.inner.lock().unwrap();
        if !state.initialized {
            return Err(CameraError::NotStarted);
        }
        if state.outstanding >= state.slots {
            state.starved += 1;
            return Ok(None);
        }

        match state.frames.pop_front() {
            Some(data) => {
                state.sequence += 1;
                state.outstanding += 1;
                state.acquired += 1;
                Ok(Some(FrameBuffer {
                    data,
                    seq: state.sequence,
                    captured_at: Instant::now(),
                }))
            }
            None => Ok(None),
        }
    }

    fn release(&mut self, frame: FrameBuffer) {
        let mut state = self.inner.lock().unwrap();
        assert!(
            state.outstanding > 0,
            "release of frame {} with no buffer outstanding",
            frame.seq
        );
        state.outstanding -= 1;
        state.released += 1;
    }
}

/// Delivery channel recording every interaction.
#[derive(Clone)]
pub struct MockChannel {
    inner: Arc<ChannelState>,
}

struct ChannelState {
    connected: AtomicBool,
    connect_called: AtomicBool,
    closed: AtomicBool,
    liveness_queries: AtomicUsize,
    connect_after_queries: Option<usize>,
    send_attempts: AtomicUsize,
    sent: Mutex<Vec<Bytes>>,
    fail_sends: Mutex<VecDeque<ChannelError>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelState {
                connected: AtomicBool::new(false),
                connect_called: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                liveness_queries: AtomicUsize::new(0),
                connect_after_queries: None,
                send_attempts: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
                fail_sends: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Start connected.
    pub fn connected() -> Self {
        let channel = Self::new();
        channel.set_connected(true);
        channel
    }

    /// Report disconnected for the first `n` liveness queries and
    /// connected afterwards: a deterministic stand-in for a connection
    /// that comes up while the loop is already running.
    pub fn connected_after_queries(n: usize) -> Self {
        Self {
            inner: Arc::new(ChannelState {
                connected: AtomicBool::new(false),
                connect_called: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                liveness_queries: AtomicUsize::new(0),
                connect_after_queries: Some(n),
                send_attempts: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
                fail_sends: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::Release);
    }

    /// Queue a failure for an upcoming send.
    pub fn fail_next_send(&self, error: ChannelError) {
        self.inner.fail_sends.lock().unwrap().push_back(error);
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.inner.send_attempts.load(Ordering::Acquire)
    }

    pub fn liveness_queries(&self) -> usize {
        self.inner.liveness_queries.load(Ordering::Acquire)
    }

    pub fn connect_called(&self) -> bool {
        self.inner.connect_called.load(Ordering::Acquire)
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageChannel for MockChannel {
    fn connect(&self) {
        self.inner.connect_called.store(true, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        let query = self.inner.liveness_queries.fetch_add(1, Ordering::AcqRel);
        if let Some(after) = self.inner.connect_after_queries {
            if query >= after {
                self.inner.connected.store(true, Ordering::Release);
            }
        }
        self.inner.connected.load(Ordering::Acquire)
    }

    async fn send_binary(&self, payload: Bytes, _policy: SendPolicy) -> Result<(), ChannelError> {
        self.inner.send_attempts.fetch_add(1, Ordering::AcqRel);

        if let Some(error) = self.inner.fail_sends.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.inner.sent.lock().unwrap().push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_camera_enforces_pool_slots() {
        let mut camera = MockCamera::new()
            .with_frames([Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
        camera.init().unwrap();

        let first = camera.acquire().await.unwrap().unwrap();
        // Single slot: a second acquisition starves until release.
        assert!(camera.acquire().await.unwrap().is_none());
        assert_eq!(camera.starved(), 1);

        camera.release(first);
        assert!(camera.acquire().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn mock_channel_connects_on_schedule() {
        let channel = MockChannel::connected_after_queries(2);
        assert!(!channel.is_connected());
        assert!(!channel.is_connected());
        assert!(channel.is_connected());
    }
}

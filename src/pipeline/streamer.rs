//! The streaming loop: acquire, deliver, release, pace.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::capture::FrameSource;
use crate::channel::{MessageChannel, SendPolicy};
use crate::error::StreamError;
use crate::net::ConnectivityGate;
use crate::pipeline::RateMonitor;
use crate::Config;

/// Outcome of a single acquisition/delivery cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// Frame acquired and handed to the transport.
    Delivered,
    /// Frame acquired while the channel was offline; dropped.
    DroppedOffline,
    /// Frame acquired but the send failed or timed out; dropped.
    DroppedSendFailed,
    /// Nothing to deliver this cycle.
    NoFrame,
}

/// Orchestrates the whole capture-to-delivery pipeline.
///
/// Collaborators are injected and owned, so the loop can be driven against
/// fake sources and channels. `run` walks the startup sequence (wait for
/// connectivity, bring up the camera, start the channel dialing) and then
/// cycles until shutdown.
pub struct Streamer<G, S, C> {
    gate: G,
    source: S,
    channel: C,
    ready_timeout: Duration,
    settle: Duration,
    pacing: Duration,
    send_policy: SendPolicy,
    monitor: RateMonitor,
    shutdown: watch::Receiver<bool>,
}

impl<G, S, C> Streamer<G, S, C>
where
    G: ConnectivityGate,
    S: FrameSource,
    C: MessageChannel,
{
    pub fn new(
        gate: G,
        source: S,
        channel: C,
        config: &Config,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            gate,
            source,
            channel,
            ready_timeout: config.network.ready_timeout(),
            settle: config.network.settle(),
            pacing: config.pipeline.pacing(),
            send_policy: SendPolicy::Wait(config.channel.send_timeout()),
            monitor: RateMonitor::new(Instant::now()),
            shutdown,
        }
    }

    /// Run until shutdown. The only errors that escape are the fatal
    /// startup ones; everything inside the loop is absorbed.
    pub async fn run(mut self) -> Result<(), StreamError> {
        info!("waiting for network");
        self.gate.await_ready(self.ready_timeout).await?;
        tokio::time::sleep(self.settle).await;

        self.source.init()?;
        self.channel.connect();

        info!("streaming, pacing {:?}", self.pacing);
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.pacing) => {}
                changed = self.shutdown.changed() => {
                    // Sender gone counts as shutdown; an actual change is
                    // re-checked at the top of the loop.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("stream stopping");
        if let Err(e) = self.channel.close().await {
            warn!("channel close failed: {}", e);
        }
        Ok(())
    }

    /// One acquisition/delivery cycle.
    pub async fn cycle(&mut self) -> Cycle {
        let outcome = match self.source.acquire().await {
            Ok(Some(frame)) => {
                let outcome = if self.channel.is_connected() {
                    match self.channel.send_binary(frame.data.clone(), self.send_policy).await {
                        Ok(()) => {
                            trace!(seq = frame.seq, len = frame.len(), "frame delivered");
                            metrics::counter!("frames_delivered").increment(1);
                            Cycle::Delivered
                        }
                        Err(e) => {
                            debug!(seq = frame.seq, "frame dropped: {}", e);
                            metrics::counter!("frames_dropped").increment(1);
                            Cycle::DroppedSendFailed
                        }
                    }
                } else {
                    trace!(seq = frame.seq, "channel offline, frame dropped");
                    metrics::counter!("frames_dropped").increment(1);
                    Cycle::DroppedOffline
                };

                // The slot goes back to the pool on every path above.
                self.source.release(frame);
                outcome
            }
            Ok(None) => {
                trace!("no frame available");
                Cycle::NoFrame
            }
            Err(e) => {
                warn!("acquisition failed: {}", e);
                Cycle::NoFrame
            }
        };

        if let Some(fps) = self.monitor.tick(Instant::now()) {
            info!("current fps: {:.2}", fps);
            metrics::gauge!("capture_fps").set(f64::from(fps));
        }

        outcome
    }
}

//! Network readiness gate.
//!
//! Streaming must not start before the device has connectivity. The gate
//! blocks the startup sequence with an explicit deadline; an unbounded
//! wait here would stall the whole process on an external dependency.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

use crate::error::GateError;
use crate::NetworkConfig;

/// Blocks the caller until network connectivity is established.
#[async_trait]
pub trait ConnectivityGate: Send + Sync {
    /// Wait for a connectivity signal, at most `deadline` long.
    async fn await_ready(&self, deadline: Duration) -> Result<(), GateError>;
}

/// Gate that probes TCP reachability of a configured address.
pub struct TcpProbeGate {
    probe_addr: String,
    probe_interval: Duration,
}

impl TcpProbeGate {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            probe_addr: config.probe_addr.clone(),
            probe_interval: config.probe_interval(),
        }
    }
}

#[async_trait]
impl ConnectivityGate for TcpProbeGate {
    async fn await_ready(&self, deadline: Duration) -> Result<(), GateError> {
        let expiry = Instant::now() + deadline;

        loop {
            let remaining = expiry.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(GateError::ReadyTimeout(deadline));
            }

            match timeout(remaining.min(self.probe_interval), TcpStream::connect(&self.probe_addr))
                .await
            {
                Ok(Ok(_)) => {
                    info!("network ready ({} reachable)", self.probe_addr);
                    return Ok(());
                }
                Ok(Err(e)) => debug!("probe of {} failed: {}", self.probe_addr, e),
                Err(_) => debug!("probe of {} timed out", self.probe_addr),
            }

            if Instant::now() + self.probe_interval >= expiry {
                return Err(GateError::ReadyTimeout(deadline));
            }
            sleep(self.probe_interval).await;
        }
    }
}

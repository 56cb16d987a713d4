//! WebSocket delivery channel.
//!
//! A background worker owns the socket: it dials the endpoint, forwards
//! queued payloads as binary messages, answers pings, and redials after a
//! fixed delay when the connection drops. The streaming loop sees only the
//! connected flag and the bounded outbound queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::channel::{MessageChannel, SendPolicy};
use crate::error::ChannelError;
use crate::ChannelConfig;

pub struct WsChannel {
    endpoint: String,
    reconnect_delay: Duration,
    tx: flume::Sender<Bytes>,
    rx: flume::Receiver<Bytes>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    connected: AtomicBool,
    closing: AtomicBool,
    shutdown: Notify,
}

enum PumpExit {
    Shutdown,
    Disconnected,
}

impl WsChannel {
    pub fn new(config: &ChannelConfig) -> Self {
        let (tx, rx) = flume::bounded(config.queue_depth);
        Self {
            endpoint: config.endpoint.clone(),
            reconnect_delay: config.reconnect_delay(),
            tx,
            rx,
            shared: Arc::new(Shared {
                connected: AtomicBool::new(false),
                closing: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
            worker: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MessageChannel for WsChannel {
    fn connect(&self) {
        let mut worker = self.worker.lock().expect("worker mutex poisoned");
        if worker.is_some() {
            return;
        }

        info!("connecting to {}", self.endpoint);
        let endpoint = self.endpoint.clone();
        let rx = self.rx.clone();
        let shared = self.shared.clone();
        let delay = self.reconnect_delay;
        *worker = Some(tokio::spawn(run_worker(endpoint, rx, shared, delay)));
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    async fn send_binary(&self, payload: Bytes, policy: SendPolicy) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }

        match policy {
            SendPolicy::NoWait => self.tx.try_send(payload).map_err(|e| match e {
                flume::TrySendError::Full(_) => ChannelError::QueueFull,
                flume::TrySendError::Disconnected(_) => ChannelError::Closed,
            }),
            SendPolicy::Wait(bound) => {
                match tokio::time::timeout(bound, self.tx.send_async(payload)).await {
                    Err(_) => Err(ChannelError::SendTimeout(bound)),
                    Ok(Err(_)) => Err(ChannelError::Closed),
                    Ok(Ok(())) => Ok(()),
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.shared.closing.store(true, Ordering::Release);
        self.shared.shutdown.notify_one();

        let worker = self.worker.lock().expect("worker mutex poisoned").take();
        if let Some(handle) = worker {
            handle.await.ok();
        }
        self.shared.connected.store(false, Ordering::Release);
        Ok(())
    }
}

async fn run_worker(
    endpoint: String,
    rx: flume::Receiver<Bytes>,
    shared: Arc<Shared>,
    reconnect_delay: Duration,
) {
    loop {
        if shared.closing.load(Ordering::Acquire) {
            break;
        }

        tokio::select! {
            _ = shared.shutdown.notified() => break,
            conn = connect_async(endpoint.as_str()) => match conn {
                Ok((socket, _)) => {
                    info!("channel connected");
                    shared.connected.store(true, Ordering::Release);
                    let exit = pump(socket, &rx, &shared).await;
                    shared.connected.store(false, Ordering::Release);
                    if matches!(exit, PumpExit::Shutdown) {
                        break;
                    }
                    metrics::counter!("channel_reconnects").increment(1);
                    warn!("channel disconnected, redialing in {:?}", reconnect_delay);
                }
                Err(e) => {
                    warn!("connect to {} failed: {}, retrying in {:?}", endpoint, e, reconnect_delay);
                }
            }
        }

        tokio::select! {
            _ = shared.shutdown.notified() => break,
            _ = sleep(reconnect_delay) => {}
        }
    }

    debug!("channel worker stopped");
}

async fn pump(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    rx: &flume::Receiver<Bytes>,
    shared: &Shared,
) -> PumpExit {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            _ = shared.shutdown.notified() => {
                let _ = sink.send(Message::Close(None)).await;
                return PumpExit::Shutdown;
            }
            payload = rx.recv_async() => match payload {
                Ok(payload) => {
                    if let Err(e) = sink.send(Message::Binary(payload)).await {
                        debug!("send failed: {}", e);
                        return PumpExit::Disconnected;
                    }
                }
                // All senders gone means the channel owner is going away.
                Err(_) => return PumpExit::Shutdown,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => return PumpExit::Disconnected,
                Some(Ok(_)) => {} // nothing to do with peer text/binary
                Some(Err(e)) => {
                    debug!("receive failed: {}", e);
                    return PumpExit::Disconnected;
                }
            },
        }
    }
}

//! Streaming loop behavior against scripted collaborators.

use bytes::Bytes;
use tokio::sync::watch;

use argus::error::{ChannelError, StreamError};
use argus::pipeline::Cycle;
use argus::testing::{MockCamera, MockChannel, MockGate};
use argus::{Config, FrameSource, Streamer};

fn frames(payloads: &[&'static [u8]]) -> Vec<Bytes> {
    payloads.iter().map(|p| Bytes::from_static(p)).collect()
}

fn make_streamer(
    camera: MockCamera,
    channel: MockChannel,
) -> (
    Streamer<MockGate, MockCamera, MockChannel>,
    watch::Sender<bool>,
) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let streamer = Streamer::new(
        MockGate::ready(),
        camera,
        channel,
        &Config::default(),
        shutdown_rx,
    );
    (streamer, shutdown_tx)
}

/// An initialized camera for tests that drive cycles directly.
fn initialized(camera: MockCamera) -> MockCamera {
    let mut handle = camera.clone();
    handle.init().unwrap();
    camera
}

#[tokio::test]
async fn one_release_per_acquisition_on_every_delivery_path() {
    let camera = initialized(MockCamera::new().with_frames(frames(&[b"a", b"b", b"c"])));
    // Offline for the first cycle, connected afterwards.
    let channel = MockChannel::connected_after_queries(1);
    channel.fail_next_send(ChannelError::SendTimeout(std::time::Duration::from_millis(100)));

    let (mut streamer, _shutdown) = make_streamer(camera.clone(), channel.clone());

    assert_eq!(streamer.cycle().await, Cycle::DroppedOffline);
    assert_eq!(streamer.cycle().await, Cycle::DroppedSendFailed);
    assert_eq!(streamer.cycle().await, Cycle::Delivered);

    // Every acquired buffer went back to the pool, whatever the path.
    assert_eq!(camera.acquired(), 3);
    assert_eq!(camera.released(), 3);
    assert_eq!(camera.outstanding(), 0);
    assert_eq!(camera.starved(), 0);
    assert_eq!(channel.sent(), frames(&[b"c"]));
}

#[tokio::test]
async fn no_send_attempt_while_disconnected() {
    let camera = initialized(MockCamera::new().with_frames(frames(&[b"a", b"b", b"c"])));
    let channel = MockChannel::new();

    let (mut streamer, _shutdown) = make_streamer(camera.clone(), channel.clone());
    for _ in 0..3 {
        assert_eq!(streamer.cycle().await, Cycle::DroppedOffline);
    }

    assert_eq!(channel.send_attempts(), 0);
    assert!(channel.sent().is_empty());
    assert_eq!(camera.released(), 3);
}

#[tokio::test]
async fn dropped_send_does_not_halt_the_loop() {
    let camera = initialized(MockCamera::new().with_frames(frames(&[b"a", b"b"])));
    let channel = MockChannel::connected();
    channel.fail_next_send(ChannelError::QueueFull);

    let (mut streamer, _shutdown) = make_streamer(camera.clone(), channel.clone());

    assert_eq!(streamer.cycle().await, Cycle::DroppedSendFailed);
    assert_eq!(streamer.cycle().await, Cycle::Delivered);
    assert_eq!(channel.sent(), frames(&[b"b"]));
}

#[tokio::test]
async fn exhausted_source_keeps_cycling_without_frames() {
    let camera = initialized(MockCamera::new());
    let channel = MockChannel::connected();

    let (mut streamer, _shutdown) = make_streamer(camera.clone(), channel.clone());
    assert_eq!(streamer.cycle().await, Cycle::NoFrame);
    assert_eq!(channel.send_attempts(), 0);
    assert_eq!(camera.released(), 0);
}

#[tokio::test(start_paused = true)]
async fn camera_init_failure_halts_before_any_acquisition() {
    let camera = MockCamera::new().failing_init();
    let channel = MockChannel::new();

    let (streamer, _shutdown) = make_streamer(camera.clone(), channel.clone());
    let result = streamer.run().await;

    assert!(matches!(result, Err(StreamError::Camera(_))));
    assert_eq!(camera.acquired(), 0);
    assert!(!channel.connect_called());
}

#[tokio::test(start_paused = true)]
async fn network_timeout_halts_before_camera_init() {
    let camera = MockCamera::new();
    let channel = MockChannel::new();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let streamer = Streamer::new(
        MockGate::never_ready(),
        camera.clone(),
        channel.clone(),
        &Config::default(),
        shutdown_rx,
    );
    drop(shutdown_tx);

    assert!(matches!(streamer.run().await, Err(StreamError::Gate(_))));
    assert_eq!(camera.acquired(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_streaming_still_closes_the_channel() {
    let camera = MockCamera::new();
    let channel = MockChannel::new();

    let (streamer, shutdown_tx) = make_streamer(camera.clone(), channel.clone());
    shutdown_tx.send(true).unwrap();

    streamer.run().await.unwrap();
    assert!(channel.closed());
    assert_eq!(camera.acquired(), 0);
}

#[tokio::test(start_paused = true)]
async fn pacing_spaces_iterations_by_the_configured_interval() {
    let payloads: Vec<Bytes> = (0..32).map(|_| Bytes::from_static(b"x")).collect();
    let camera = MockCamera::new().with_frames(payloads);
    let channel = MockChannel::connected();

    let (streamer, shutdown_tx) = make_streamer(camera.clone(), channel.clone());
    let handle = tokio::spawn(streamer.run());

    // Let the loop run for ten pacing intervals of virtual time.
    tokio::time::sleep(Config::default().network.settle()).await;
    let before = camera.acquired();
    tokio::time::sleep(std::time::Duration::from_millis(670)).await;
    let after = camera.acquired();

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let cycles = after - before;
    assert!(
        (9..=11).contains(&cycles),
        "expected ~10 cycles in 670ms, got {}",
        cycles
    );
}

/// The end-to-end scenario: connectivity comes up, the camera initializes,
/// the channel connects while the loop is already running. Frames produced
/// before the connection are dropped silently; everything after flows
/// through as binary payloads.
#[tokio::test(start_paused = true)]
async fn frames_before_connection_drop_and_later_frames_deliver() {
    let camera =
        MockCamera::new().with_frames(frames(&[b"f1", b"f2", b"f3", b"f4", b"f5", b"f6"]));
    let channel = MockChannel::connected_after_queries(3);

    let (streamer, shutdown_tx) = make_streamer(camera.clone(), channel.clone());
    let handle = tokio::spawn(streamer.run());

    // Wait (in virtual time) until the camera has handed out all frames.
    for _ in 0..200 {
        if camera.acquired() == 6 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(67)).await;
    }
    assert_eq!(camera.acquired(), 6);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(channel.sent(), frames(&[b"f4", b"f5", b"f6"]));
    assert_eq!(camera.released(), 6);
    assert_eq!(camera.outstanding(), 0);
    assert!(channel.connect_called());
    assert!(channel.closed());
}

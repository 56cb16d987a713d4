//! Rolling one-second frame rate counter.

use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Counts loop iterations and emits one frames-per-second sample each time
/// a full window elapses. Timestamps come from the caller, so the counter
/// is a pure function of the clock it is fed.
#[derive(Debug)]
pub struct RateMonitor {
    last_sample: Instant,
    frames: u32,
    last_fps: f32,
}

impl RateMonitor {
    pub fn new(now: Instant) -> Self {
        Self {
            last_sample: now,
            frames: 0,
            last_fps: 0.0,
        }
    }

    /// Count one frame. Returns the observed rate when the rolling window
    /// has elapsed, resetting the counter for the next window.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;

        if now.duration_since(self.last_sample) >= WINDOW {
            self.last_fps = self.frames as f32;
            self.frames = 0;
            self.last_sample = now;
            Some(self.last_fps)
        } else {
            None
        }
    }

    /// Most recently computed rate.
    pub fn last_fps(&self) -> f32 {
        self.last_fps
    }

    /// Frames counted in the window currently being accumulated.
    pub fn frames_this_window(&self) -> u32 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifteen_frames_in_one_second_reads_fifteen_fps() {
        let t0 = Instant::now();
        let mut monitor = RateMonitor::new(t0);

        for i in 1..15 {
            let inside = t0 + Duration::from_micros(i * 60_000);
            assert_eq!(monitor.tick(inside), None);
        }

        let sample = monitor.tick(t0 + Duration::from_micros(1_000_000));
        assert_eq!(sample, Some(15.0));
        assert_eq!(monitor.frames_this_window(), 0);
        assert_eq!(monitor.last_fps(), 15.0);
    }

    #[test]
    fn no_sample_before_the_window_elapses() {
        let t0 = Instant::now();
        let mut monitor = RateMonitor::new(t0);

        assert_eq!(monitor.tick(t0 + Duration::from_millis(999)), None);
        assert_eq!(monitor.frames_this_window(), 1);
    }

    #[test]
    fn window_restarts_after_each_sample() {
        let t0 = Instant::now();
        let mut monitor = RateMonitor::new(t0);

        assert_eq!(monitor.tick(t0 + Duration::from_secs(1)), Some(1.0));

        // Second window accumulates independently of the first.
        assert_eq!(monitor.tick(t0 + Duration::from_millis(1500)), None);
        assert_eq!(monitor.tick(t0 + Duration::from_secs(2)), Some(2.0));
    }
}

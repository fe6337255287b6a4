//! Frame sources: where [`Engine::pump`](crate::tick::Engine::pump) gets its
//! timestamps from.
//!
//! The engine never talks to a host frame callback directly. A
//! [`FrameSource`] yields one timestamp per scheduled frame; headless runs and
//! tests use [`SyntheticFrames`], real-time hosts use [`WallClockFrames`].

use std::thread;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;

/// Supplies frame timestamps in milliseconds.
pub trait FrameSource {
    /// Wait for the next frame and return its timestamp, or `None` when the
    /// source is exhausted.
    fn next_frame(&mut self) -> Option<f64>;
}

// ---------------------------------------------------------------------------
// SyntheticFrames
// ---------------------------------------------------------------------------

/// Fixed-step timestamps with no waiting.
///
/// ```
/// use mote_engine::frame::{FrameSource, SyntheticFrames};
///
/// let mut frames = SyntheticFrames::new(10.0).with_limit(2);
/// assert_eq!(frames.next_frame(), Some(10.0));
/// assert_eq!(frames.next_frame(), Some(20.0));
/// assert_eq!(frames.next_frame(), None);
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticFrames {
    now: f64,
    step_ms: f64,
    remaining: Option<u64>,
}

impl SyntheticFrames {
    /// Frames every `step_ms` milliseconds, starting one step after zero.
    pub fn new(step_ms: f64) -> Self {
        Self {
            now: 0.0,
            step_ms,
            remaining: None,
        }
    }

    pub fn at_fps(fps: f64) -> Self {
        Self::new(1000.0 / fps)
    }

    /// Start counting from `time_ms` instead of zero.
    pub fn starting_at(mut self, time_ms: f64) -> Self {
        self.now = time_ms;
        self
    }

    /// Yield at most `frames` timestamps.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.remaining = Some(frames);
        self
    }
}

impl FrameSource for SyntheticFrames {
    fn next_frame(&mut self) -> Option<f64> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }
        self.now += self.step_ms;
        Some(self.now)
    }
}

// ---------------------------------------------------------------------------
// WallClockFrames
// ---------------------------------------------------------------------------

/// Real-time timestamps paced to a target frame rate.
///
/// Each call sleeps until one frame interval has passed since the previous
/// frame, then returns the milliseconds elapsed since the source was created.
#[derive(Debug, Clone)]
pub struct WallClockFrames {
    start: Instant,
    interval: Duration,
    last: Option<Instant>,
}

impl WallClockFrames {
    pub fn new(target_fps: f64) -> Self {
        Self {
            start: Instant::now(),
            interval: Duration::from_secs_f64(1.0 / target_fps),
            last: None,
        }
    }

    /// Paced to the config's validated `target_fps`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.target_fps)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FrameSource for WallClockFrames {
    fn next_frame(&mut self) -> Option<f64> {
        if let Some(last) = self.last {
            let due = last + self.interval;
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }
        let now = Instant::now();
        self.last = Some(now);
        Some(now.duration_since(self.start).as_secs_f64() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_frames_step_from_offset() {
        let mut frames = SyntheticFrames::at_fps(50.0).starting_at(1000.0);
        assert_eq!(frames.next_frame(), Some(1020.0));
        assert_eq!(frames.next_frame(), Some(1040.0));
    }

    #[test]
    fn zero_limit_yields_nothing() {
        let mut frames = SyntheticFrames::new(16.0).with_limit(0);
        assert_eq!(frames.next_frame(), None);
    }

    #[test]
    fn wall_clock_frames_are_paced_and_monotonic() {
        let mut frames = WallClockFrames::new(200.0);
        assert!((frames.interval().as_secs_f64() - 0.005).abs() < 1e-6);
        let first = frames.next_frame().unwrap();
        let second = frames.next_frame().unwrap();
        assert!(second - first >= 4.9, "frames {first} and {second} too close");
    }
}

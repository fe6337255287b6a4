//! Frame clock: delta time and a once-per-second frame rate.

/// Tracks frame timestamps handed to [`Engine::tick`](crate::tick::Engine::tick).
///
/// Timestamps are milliseconds on a monotonically increasing timeline. The
/// frame rate is recomputed whenever more than one second has passed since
/// the last recompute, and holds the number of frames counted in that
/// window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clock {
    last_frame_time: f64,
    delta_time: f64,
    frame_count: u32,
    frame_time: f64,
    fps: u32,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the frame at `time_ms`.
    pub fn update(&mut self, time_ms: f64) {
        self.delta_time = (time_ms - self.last_frame_time) / 1000.0;
        self.last_frame_time = time_ms;

        if self.frame_time + 1000.0 >= time_ms {
            self.frame_count += 1;
        } else {
            self.frame_time = time_ms;
            self.fps = self.frame_count;
            self.frame_count = 0;
        }
    }

    /// Timestamp of the latest frame, in milliseconds.
    pub fn time(&self) -> f64 {
        self.last_frame_time
    }

    /// Seconds since the previous frame.
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Frames counted over the last full one-second window.
    pub fn fps(&self) -> u32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_time_is_in_seconds() {
        let mut clock = Clock::new();
        clock.update(100.0);
        assert!((clock.delta_time() - 0.1).abs() < 1e-12);
        clock.update(116.0);
        assert!((clock.delta_time() - 0.016).abs() < 1e-12);
        assert_eq!(clock.time(), 116.0);
    }

    #[test]
    fn fps_recomputed_once_window_rolls_over() {
        let mut clock = Clock::new();
        // 60 frames inside the first second.
        for frame in 1..=60 {
            clock.update(frame as f64 * 1000.0 / 60.0);
        }
        assert_eq!(clock.fps(), 0);

        // First frame past the window publishes the count.
        clock.update(1020.0);
        assert_eq!(clock.fps(), 60);
    }

    #[test]
    fn fps_resets_after_publish() {
        let mut clock = Clock::new();
        for t in [500.0, 1500.0, 1600.0, 2600.0] {
            clock.update(t);
        }
        // 500 counted, 1500 publishes 1, 1600 counted, 2600 publishes 1.
        assert_eq!(clock.fps(), 1);
    }
}

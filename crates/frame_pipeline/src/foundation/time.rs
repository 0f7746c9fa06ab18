//! Frame timing
//!
//! The frame loop only needs an elapsed-time scalar and a per-frame delta;
//! `FrameTimer` also keeps a one-second statistics window for logging.

use std::time::{Duration, Instant};

/// Timing values handed to the pass constants each frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTiming {
    /// Seconds since the timer was created
    pub total: f32,
    /// Seconds since the previous tick
    pub delta: f32,
}

impl FrameTiming {
    /// Timing for a fixed-step frame `frame_index` at `step` seconds per frame
    pub fn fixed_step(frame_index: u64, step: f32) -> Self {
        Self {
            total: frame_index as f32 * step,
            delta: step,
        }
    }
}

/// Frame rate sample produced once per statistics window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Frames per second over the window
    pub fps: f32,
    /// Average milliseconds per frame over the window
    pub ms_per_frame: f32,
}

/// Monotonic frame timer
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    window_start: Instant,
    window_frames: u32,
    window: Duration,
    latest_stats: Option<FrameStats>,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Create a timer starting now with a one-second statistics window
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a timer anchored at `start`
    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            last_tick: start,
            window_start: start,
            window_frames: 0,
            window: Duration::from_secs(1),
            latest_stats: None,
        }
    }

    /// Advance to the current instant
    pub fn tick(&mut self) -> FrameTiming {
        self.tick_at(Instant::now())
    }

    /// Advance to `now`
    pub fn tick_at(&mut self, now: Instant) -> FrameTiming {
        let delta = now.saturating_duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        self.window_frames += 1;
        let window_elapsed = now.saturating_duration_since(self.window_start);
        if window_elapsed >= self.window {
            let seconds = window_elapsed.as_secs_f32();
            let fps = self.window_frames as f32 / seconds;
            self.latest_stats = Some(FrameStats {
                fps,
                ms_per_frame: 1000.0 / fps,
            });
            self.window_frames = 0;
            self.window_start = now;
        }

        FrameTiming {
            total: now.saturating_duration_since(self.start).as_secs_f32(),
            delta,
        }
    }

    /// Take the statistics sample produced by the last completed window
    pub fn take_stats(&mut self) -> Option<FrameStats> {
        self.latest_stats.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tick_reports_total_and_delta() {
        let start = Instant::now();
        let mut timer = FrameTimer::starting_at(start);

        let first = timer.tick_at(start + Duration::from_millis(16));
        let second = timer.tick_at(start + Duration::from_millis(48));

        assert_relative_eq!(first.delta, 0.016, epsilon = 1e-6);
        assert_relative_eq!(second.delta, 0.032, epsilon = 1e-6);
        assert_relative_eq!(second.total, 0.048, epsilon = 1e-6);
    }

    #[test]
    fn test_stats_window() {
        let start = Instant::now();
        let mut timer = FrameTimer::starting_at(start);

        for frame in 1..=9 {
            timer.tick_at(start + Duration::from_millis(100 * frame));
            assert!(timer.take_stats().is_none());
        }
        timer.tick_at(start + Duration::from_millis(1000));

        let stats = timer.take_stats().expect("window should have closed");
        assert_relative_eq!(stats.fps, 10.0, epsilon = 1e-4);
        assert_relative_eq!(stats.ms_per_frame, 100.0, epsilon = 1e-2);
        assert!(timer.take_stats().is_none());
    }

    #[test]
    fn test_fixed_step_timing() {
        let timing = FrameTiming::fixed_step(30, 1.0 / 60.0);
        assert_relative_eq!(timing.total, 0.5, epsilon = 1e-6);
    }
}

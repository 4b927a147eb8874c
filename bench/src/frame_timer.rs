//! Frame timing for driven game loops.
//!
//! Criterion measures the mean of many iterations; a game loop cares about the tail. These
//! helpers record every frame of a [`FrameDriver`] run and summarize the distribution.

use std::time::{Duration, Instant};

use rusty_loop::core::{FrameDriver, LoopError};

/// Distribution of recorded frame times.
#[derive(Debug, Clone)]
pub struct FrameStats {
    /// Number of frames recorded.
    pub frame_count: usize,
    /// Sum of all frame times.
    pub total_duration: Duration,
    /// Fixed ticks advanced across the run.
    pub fixed_steps: u64,
    /// Frame times in ascending order.
    sorted_times: Vec<Duration>,
}

impl FrameStats {
    pub fn from_times(mut times: Vec<Duration>, fixed_steps: u64) -> Self {
        times.sort_unstable();
        Self {
            frame_count: times.len(),
            total_duration: times.iter().sum(),
            fixed_steps,
            sorted_times: times,
        }
    }

    pub fn min(&self) -> Duration {
        self.sorted_times.first().copied().unwrap_or_default()
    }

    pub fn max(&self) -> Duration {
        self.sorted_times.last().copied().unwrap_or_default()
    }

    pub fn average(&self) -> Duration {
        match u32::try_from(self.frame_count) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(count) => self.total_duration / count,
        }
    }

    /// Frame time at percentile `p` (clamped to 0-100).
    pub fn percentile(&self, p: usize) -> Duration {
        let Some(last) = self.sorted_times.len().checked_sub(1) else {
            return Duration::ZERO;
        };
        let index = (self.sorted_times.len() * p.min(100) / 100).min(last);
        self.sorted_times[index]
    }

    pub fn median(&self) -> Duration {
        self.percentile(50)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99)
    }

    /// Average fixed ticks per frame.
    pub fn fixed_steps_per_frame(&self) -> f64 {
        if self.frame_count == 0 {
            0.0
        } else {
            self.fixed_steps as f64 / self.frame_count as f64
        }
    }
}

impl std::fmt::Display for FrameStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, avg: {:.3}ms, p50: {:.3}ms, p99: {:.3}ms, max: {:.3}ms, {:.2} fixed/frame",
            self.frame_count,
            self.average().as_secs_f64() * 1000.0,
            self.median().as_secs_f64() * 1000.0,
            self.p99().as_secs_f64() * 1000.0,
            self.max().as_secs_f64() * 1000.0,
            self.fixed_steps_per_frame(),
        )
    }
}

/// Records individual frame times.
pub struct FrameTimer {
    frame_times: Vec<Duration>,
    frame_start: Option<Instant>,
    fixed_steps: u64,
}

impl FrameTimer {
    pub fn new(expected_frames: usize) -> Self {
        Self {
            frame_times: Vec::with_capacity(expected_frames),
            frame_start: None,
            fixed_steps: 0,
        }
    }

    pub fn begin_frame(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    /// Record the frame started by the last [`begin_frame`](Self::begin_frame).
    pub fn end_frame(&mut self, fixed_steps: u32) {
        if let Some(start) = self.frame_start.take() {
            self.frame_times.push(start.elapsed());
            self.fixed_steps += u64::from(fixed_steps);
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_times.len()
    }

    pub fn stats(self) -> FrameStats {
        FrameStats::from_times(self.frame_times, self.fixed_steps)
    }
}

/// Drive `frame_count` frames with a constant simulated `delta` and time each one.
///
/// A constant delta keeps the fixed-step count per frame deterministic, so runs are comparable.
pub fn measure_driver(
    driver: &mut FrameDriver,
    frame_count: usize,
    delta: Duration,
) -> Result<FrameStats, LoopError> {
    let mut timer = FrameTimer::new(frame_count);
    for _ in 0..frame_count {
        timer.begin_frame();
        let report = driver.frame_with_delta(delta)?;
        timer.end_frame(report.fixed_steps);
    }
    Ok(timer.stats())
}

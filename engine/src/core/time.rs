use std::time::{Duration, Instant};

use crate::core::config::Config;

pub const SIXTY_FPS: u64 = 16_666_666;

/// Frame timing for the host driver. Each frame captures total elapsed time as well as the
/// delta since the last frame, and accumulates delta into fixed-size steps.
///
/// New frames are generated from the previous one with [`next`](Self::next) (wall clock) or
/// [`advance_by`](Self::advance_by) (explicit delta, for tests and replays).
#[derive(Debug, Copy, Clone)]
pub struct Time {
    // The instant the current frame started
    instant: Instant,
    pub fixed_time_step: u64,
    /// The time delta since the last frame
    pub delta: Duration,
    /// The total elapsed time since the first frame
    pub time: Duration,
    /// The total elapsed time since the first frame but incremented by the fixed time step
    pub fixed_time: Duration,
    /// Delta not yet consumed by fixed steps
    accumulator: u64,
}

impl Time {
    /// Construct with delta and time set to `0`. The fixed time step is in nanoseconds.
    pub fn new(fixed_time_step: u64) -> Self {
        Self {
            fixed_time_step,
            instant: Instant::now(),
            delta: Duration::ZERO,
            time: Duration::ZERO,
            fixed_time: Duration::ZERO,
            accumulator: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.fixed_time_step_nanos)
    }

    /// Consume one fixed step from the accumulator.
    pub fn increment_fixed(&mut self) {
        self.fixed_time += Duration::from_nanos(self.fixed_time_step);
        self.accumulator = self.accumulator.saturating_sub(self.fixed_time_step);
    }

    /// Create the next frame, capturing the wall-clock delta since this one.
    pub fn next(self) -> Self {
        let delta = self.instant.elapsed();
        self.advance_by(delta)
    }

    /// Create the next frame with an explicit delta.
    pub fn advance_by(self, delta: Duration) -> Self {
        let delta_nanos = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        Self {
            fixed_time_step: self.fixed_time_step,
            instant: Instant::now(),
            delta,
            time: self.time + delta,
            fixed_time: self.fixed_time,
            accumulator: self.accumulator.saturating_add(delta_nanos),
        }
    }

    /// Determine whether this frame has accumulated enough delta for a fixed step.
    pub fn has_fixed(&self) -> bool {
        self.fixed_time_step > 0 && self.accumulator >= self.fixed_time_step
    }

    /// Discard whole fixed steps still pending, keeping the sub-step remainder. Returns how
    /// many steps were dropped.
    pub fn drop_backlog(&mut self) -> u64 {
        if self.fixed_time_step == 0 {
            return 0;
        }
        let dropped = self.accumulator / self.fixed_time_step;
        self.accumulator %= self.fixed_time_step;
        dropped
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new(SIXTY_FPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_fixed_steps() {
        let mut time = Time::new(10).advance_by(Duration::from_nanos(25));

        let mut steps = 0;
        while time.has_fixed() {
            time.increment_fixed();
            steps += 1;
        }

        assert_eq!(steps, 2);
        assert_eq!(time.fixed_time, Duration::from_nanos(20));
        // The remainder carries into the next frame.
        let time = time.advance_by(Duration::from_nanos(5));
        assert!(time.has_fixed());
        assert_eq!(time.time, Duration::from_nanos(30));
    }

    #[test]
    fn drop_backlog_keeps_remainder() {
        let mut time = Time::new(10).advance_by(Duration::from_nanos(47));

        assert_eq!(time.drop_backlog(), 4);
        assert!(!time.has_fixed());
        let time = time.advance_by(Duration::from_nanos(3));
        assert!(time.has_fixed());
    }
}

// Race countdown advanced by the fixed-step tick instead of a timer task.

use std::time::Duration;

/// Outcome of advancing the countdown by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// Not counting (never started, or already finished).
    Idle,
    /// Still counting; carries the whole seconds left, rounded up.
    Running { seconds_left: u32 },
    /// Reached zero on this tick. Reported exactly once per countdown.
    Finished,
}

#[derive(Debug, Clone, Default)]
pub struct Countdown {
    remaining: Option<Duration>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) counting down from `duration`.
    pub fn start(&mut self, duration: Duration) {
        self.remaining = Some(duration);
    }

    /// Abandons the countdown without finishing it.
    pub fn cancel(&mut self) {
        self.remaining = None;
    }

    pub fn is_running(&self) -> bool {
        self.remaining.is_some()
    }

    pub fn seconds_left(&self) -> u32 {
        self.remaining.map_or(0, whole_seconds_up)
    }

    pub fn tick(&mut self, step: Duration) -> CountdownTick {
        let Some(remaining) = self.remaining else {
            return CountdownTick::Idle;
        };

        let remaining = remaining.saturating_sub(step);
        if remaining.is_zero() {
            self.remaining = None;
            CountdownTick::Finished
        } else {
            self.remaining = Some(remaining);
            CountdownTick::Running {
                seconds_left: whole_seconds_up(remaining),
            }
        }
    }
}

fn whole_seconds_up(duration: Duration) -> u32 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    u32::try_from(secs).unwrap_or(u32::MAX)
}

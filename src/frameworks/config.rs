use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("SANDBOX_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

/// Countdown before inputs go live; `COUNTDOWN_SECS=0` disables it.
pub fn countdown() -> Duration {
    let secs = env::var("COUNTDOWN_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_COUNTDOWN_SECS);
    Duration::from_secs(secs)
}

/// Bikes parked in the sandbox garage.
pub fn bike_count() -> u64 {
    env::var("BIKE_COUNT")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|count| *count > 0)
        .unwrap_or(DEFAULT_BIKE_COUNT)
}

pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
pub const UPDATE_BROADCAST_CAPACITY: usize = 128;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);
pub const DEFAULT_COUNTDOWN_SECS: u64 = 3;
pub const DEFAULT_BIKE_COUNT: u64 = 2;

//! Time utilities for tom
//!
//! Phase timing uses the async runtime's monotonic clock; the helpers here
//! cover the wall-clock side (event timestamps) and display formatting.

use chrono::{DateTime, Local};
use std::time::Duration;

/// Get the current local time.
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Format a wall-clock time as `HH:MM`
pub fn format_clock_time(dt: &DateTime<Local>) -> String {
    dt.format("%H:%M").to_string()
}

/// Format a countdown as `MM:SS`.
///
/// Hours are folded into the minutes field, so 90 minutes renders as `90:00`.
/// Sub-second remainders are rounded up so a phase never shows `00:00`
/// while time is still left on it.
pub fn format_countdown(remaining: Duration) -> String {
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Build a duration from whole minutes
pub fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

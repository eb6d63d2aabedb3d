//! Validated policy structures

use crate::schema::{RawConfig, RawServiceConfig};
use crate::validation::{ValidationError, check_session_seconds};
use std::time::Duration;
use tom_util::minutes;

/// Default work sessions per long break
pub const DEFAULT_MAX_ROUNDS: u32 = 4;

/// Default progress event cadence
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Session lengths and the long-break cadence.
///
/// Immutable once built; every constructor enforces positive durations and
/// `max_rounds >= 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationPolicy {
    max_rounds: u32,
    work: Duration,
    short_break: Duration,
    long_break: Duration,
}

impl DurationPolicy {
    /// Create a policy, rejecting zero rounds and zero or overlong durations
    pub fn new(
        max_rounds: u32,
        work: Duration,
        short_break: Duration,
        long_break: Duration,
    ) -> Result<Self, ValidationError> {
        if max_rounds == 0 {
            return Err(ValidationError::ZeroRounds);
        }
        check_duration("work", work)?;
        check_duration("short_break", short_break)?;
        check_duration("long_break", long_break)?;

        Ok(Self {
            max_rounds,
            work,
            short_break,
            long_break,
        })
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn work_duration(&self) -> Duration {
        self.work
    }

    pub fn short_break_duration(&self) -> Duration {
        self.short_break
    }

    pub fn long_break_duration(&self) -> Duration {
        self.long_break
    }

    /// Length of one full cycle: `max_rounds` work sessions, `max_rounds - 1`
    /// short breaks and one long break
    pub fn cycle_duration(&self) -> Duration {
        self.work * self.max_rounds
            + self.short_break * (self.max_rounds - 1)
            + self.long_break
    }
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            work: minutes(25),
            short_break: minutes(5),
            long_break: minutes(15),
        }
    }
}

fn check_duration(field: &'static str, d: Duration) -> Result<(), ValidationError> {
    if d.is_zero() {
        return Err(ValidationError::ZeroDuration { field });
    }
    // Sub-second durations pass; round up for the range check
    check_session_seconds(field, d.as_secs().max(1))
}

/// Validated settings ready for use by the engine and host process
#[derive(Debug, Clone)]
pub struct Settings {
    pub timer: DurationPolicy,

    /// Cadence of progress events during timed sessions
    pub progress_interval: Duration,

    pub service: ServiceConfig,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let defaults = DurationPolicy::default();
        let timer = DurationPolicy {
            max_rounds: raw.timer.max_rounds.unwrap_or(defaults.max_rounds),
            work: raw
                .timer
                .work_secs()
                .map(Duration::from_secs)
                .unwrap_or(defaults.work),
            short_break: raw
                .timer
                .short_break_secs()
                .map(Duration::from_secs)
                .unwrap_or(defaults.short_break),
            long_break: raw
                .timer
                .long_break_secs()
                .map(Duration::from_secs)
                .unwrap_or(defaults.long_break),
        };

        let progress_interval = raw
            .timer
            .progress_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PROGRESS_INTERVAL);

        Self {
            timer,
            progress_interval,
            service: ServiceConfig::from_raw(raw.service),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timer: DurationPolicy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            service: ServiceConfig::from_raw(RawServiceConfig::default()),
        }
    }
}

/// Host process configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            log_level: raw.log_level.unwrap_or_else(|| "info".to_string()),
        }
    }
}

//! Events published by the engine

use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Duration;

use crate::{SessionKind, TransitionCause};

/// Periodic tick from a timed phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub kind: SessionKind,
    pub round_counter: u32,
    pub elapsed: Duration,
    pub remaining: Duration,
    pub total: Duration,
}

impl ProgressEvent {
    pub fn new(kind: SessionKind, round_counter: u32, elapsed: Duration, total: Duration) -> Self {
        Self {
            kind,
            round_counter,
            elapsed,
            remaining: total.saturating_sub(elapsed),
            total,
        }
    }

    /// Fraction complete, in `0.0..=1.0`
    pub fn ratio(&self) -> f64 {
        if self.total.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.total.as_secs_f64()).clamp(0.0, 1.0)
    }
}

/// A new phase became active
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChangeEvent {
    pub kind: SessionKind,
    pub round_counter: u32,
    pub cause: TransitionCause,
    pub at: DateTime<Local>,
}

/// Everything observers can receive from the engine.
///
/// All variants travel on one channel, so observers see them in the order
/// the engine produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The user left `Ready`; a `StateChanged` to `Working(0)` follows
    SessionStarted { at: DateTime<Local> },

    StateChanged(StateChangeEvent),

    Progress(ProgressEvent),

    /// The driver loop hit an unexpected fault and stopped
    Faulted { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_remaining_and_ratio() {
        let event = ProgressEvent::new(
            SessionKind::Working,
            0,
            Duration::from_secs(15 * 60),
            Duration::from_secs(25 * 60),
        );
        assert_eq!(event.remaining, Duration::from_secs(10 * 60));
        assert!((event.ratio() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_progress_remaining_saturates() {
        let event = ProgressEvent::new(
            SessionKind::ShortBreak,
            1,
            Duration::from_secs(400),
            Duration::from_secs(300),
        );
        assert_eq!(event.remaining, Duration::ZERO);
        assert_eq!(event.ratio(), 1.0);
    }
}

//! Configuration validation

use crate::schema::{RawConfig, RawServiceConfig, RawTimerConfig};
use thiserror::Error;

/// Longest session we accept, in seconds
pub const MAX_SESSION_SECONDS: u64 = 24 * 60 * 60;

/// Progress cadence bounds, in milliseconds
pub const MIN_PROGRESS_INTERVAL_MS: u64 = 10;
pub const MAX_PROGRESS_INTERVAL_MS: u64 = 60_000;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("max_rounds must be at least 1")]
    ZeroRounds,

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("{field} of {seconds}s exceeds the {max}s limit")]
    DurationTooLong {
        field: &'static str,
        seconds: u64,
        max: u64,
    },

    #[error("progress_interval_ms {value} is outside {min}..={max}")]
    ProgressIntervalOutOfRange { value: u64, min: u64, max: u64 },

    #[error("Service config error: {0}")]
    ServiceError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = validate_timer(&config.timer);
    errors.extend(validate_service(&config.service));
    errors
}

fn validate_timer(timer: &RawTimerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if timer.max_rounds == Some(0) {
        errors.push(ValidationError::ZeroRounds);
    }

    let durations = [
        ("work", timer.work_secs()),
        ("short_break", timer.short_break_secs()),
        ("long_break", timer.long_break_secs()),
    ];
    for (field, secs) in durations {
        if let Some(secs) = secs
            && let Err(e) = check_session_seconds(field, secs)
        {
            errors.push(e);
        }
    }

    if let Some(ms) = timer.progress_interval_ms
        && !(MIN_PROGRESS_INTERVAL_MS..=MAX_PROGRESS_INTERVAL_MS).contains(&ms)
    {
        errors.push(ValidationError::ProgressIntervalOutOfRange {
            value: ms,
            min: MIN_PROGRESS_INTERVAL_MS,
            max: MAX_PROGRESS_INTERVAL_MS,
        });
    }

    if timer.work_seconds.is_some() && timer.work_minutes.is_some() {
        tracing::warn!("Both work_seconds and work_minutes set; using work_seconds");
    }

    errors
}

fn validate_service(service: &RawServiceConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(level) = &service.log_level
        && level.trim().is_empty()
    {
        errors.push(ValidationError::ServiceError(
            "log_level cannot be empty".into(),
        ));
    }

    errors
}

/// Check a single session length
pub fn check_session_seconds(field: &'static str, secs: u64) -> Result<(), ValidationError> {
    if secs == 0 {
        return Err(ValidationError::ZeroDuration { field });
    }
    if secs > MAX_SESSION_SECONDS {
        return Err(ValidationError::DurationTooLong {
            field,
            seconds: secs,
            max: MAX_SESSION_SECONDS,
        });
    }
    Ok(())
}

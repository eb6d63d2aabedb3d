//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Session durations and round count
    #[serde(default)]
    pub timer: RawTimerConfig,

    /// Host process settings
    #[serde(default)]
    pub service: RawServiceConfig,
}

/// Timer settings. Every field is optional and falls back to the classic
/// 4 x 25/5/15 cycle.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTimerConfig {
    /// Work sessions per long break
    pub max_rounds: Option<u32>,

    pub work_minutes: Option<u64>,
    pub short_break_minutes: Option<u64>,
    pub long_break_minutes: Option<u64>,

    /// Second-granularity overrides; take precedence over the `*_minutes` keys
    pub work_seconds: Option<u64>,
    pub short_break_seconds: Option<u64>,
    pub long_break_seconds: Option<u64>,

    /// Cadence of progress events while a timed session runs
    pub progress_interval_ms: Option<u64>,
}

/// Host process settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Default log filter (overridden by RUST_LOG)
    pub log_level: Option<String>,
}

impl RawTimerConfig {
    /// Work duration in seconds, if configured
    pub fn work_secs(&self) -> Option<u64> {
        self.work_seconds.or(self.work_minutes.map(|m| m.saturating_mul(60)))
    }

    pub fn short_break_secs(&self) -> Option<u64> {
        self.short_break_seconds
            .or(self.short_break_minutes.map(|m| m.saturating_mul(60)))
    }

    pub fn long_break_secs(&self) -> Option<u64> {
        self.long_break_seconds
            .or(self.long_break_minutes.map(|m| m.saturating_mul(60)))
    }
}

//! Session state machine
//!
//! The cycle has a fixed topology:
//!
//! ```text
//! Ready -> Working(0) -> ShortBreak(1) -> Working(1) -> ... -> LongBreak(M) -> Working(0) -> ...
//! ```
//!
//! A [`SessionState`] is built fresh for every transition by whoever decides
//! the transition (the retiring state on timer completion, or an advance
//! request) and handed to the engine through the [`NotificationQueue`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tom_config::DurationPolicy;
use tracing::{debug, trace};

use crate::{Notification, NotificationQueue, ProgressEvent, QueueError, TransitionCause};

/// The kind of phase currently active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Ready,
    Working,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Ready => "ready",
            SessionKind::Working => "working",
            SessionKind::ShortBreak => "short_break",
            SessionKind::LongBreak => "long_break",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One slot in the cycle, with its round counter.
///
/// `round` counts completed work sessions since the last long break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Phase {
    Ready,
    Working { round: u32 },
    ShortBreak { round: u32 },
    LongBreak { round: u32 },
}

impl Phase {
    pub fn kind(&self) -> SessionKind {
        match self {
            Phase::Ready => SessionKind::Ready,
            Phase::Working { .. } => SessionKind::Working,
            Phase::ShortBreak { .. } => SessionKind::ShortBreak,
            Phase::LongBreak { .. } => SessionKind::LongBreak,
        }
    }

    pub fn round_counter(&self) -> u32 {
        match *self {
            Phase::Ready => 0,
            Phase::Working { round }
            | Phase::ShortBreak { round }
            | Phase::LongBreak { round } => round,
        }
    }

    /// The phase that follows this one, whether it completes or is advanced
    pub fn next(&self, policy: &DurationPolicy) -> Phase {
        match *self {
            Phase::Ready => Phase::Working { round: 0 },
            Phase::Working { round } => {
                let round = round + 1;
                if round % policy.max_rounds() == 0 {
                    Phase::LongBreak { round }
                } else {
                    Phase::ShortBreak { round }
                }
            }
            Phase::ShortBreak { round } => Phase::Working { round },
            Phase::LongBreak { .. } => Phase::Working { round: 0 },
        }
    }

    /// Length of this phase; `None` for `Ready`, which waits indefinitely
    pub fn duration(&self, policy: &DurationPolicy) -> Option<Duration> {
        match self {
            Phase::Ready => None,
            Phase::Working { .. } => Some(policy.work_duration()),
            Phase::ShortBreak { .. } => Some(policy.short_break_duration()),
            Phase::LongBreak { .. } => Some(policy.long_break_duration()),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Ready => f.write_str("ready"),
            other => write!(f, "{}({})", other.kind(), other.round_counter()),
        }
    }
}

/// A live phase owned by the engine while active.
///
/// Publishes at most one [`Notification`] over its lifetime, either from its
/// own timer or from [`SessionState::advance`]; whichever comes second is a
/// no-op. Progress is never reported after the notification is out.
#[derive(Debug)]
pub struct SessionState {
    phase: Phase,
    policy: Arc<DurationPolicy>,
    published: AtomicBool,
    stop_timer: CancellationToken,
}

impl SessionState {
    pub fn new(phase: Phase, policy: Arc<DurationPolicy>) -> Self {
        Self {
            phase,
            policy,
            published: AtomicBool::new(false),
            stop_timer: CancellationToken::new(),
        }
    }

    /// The initial state of every engine
    pub fn ready(policy: Arc<DurationPolicy>) -> Self {
        Self::new(Phase::Ready, policy)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn kind(&self) -> SessionKind {
        self.phase.kind()
    }

    pub fn round_counter(&self) -> u32 {
        self.phase.round_counter()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.phase.duration(&self.policy)
    }

    /// Whether this state has already handed off its successor
    pub fn is_retired(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    /// Leave this phase now.
    ///
    /// Returns `Ok(false)` when the transition had already been published
    /// (for example, the timer fired first).
    pub fn advance(&self, queue: &NotificationQueue) -> Result<bool, QueueError> {
        self.advance_with(queue, |_| {})
    }

    /// Like [`advance`](Self::advance), running `before_publish` after this
    /// state has claimed the transition but before the notification is queued.
    /// The hook runs at most once per state.
    pub fn advance_with<F>(
        &self,
        queue: &NotificationQueue,
        before_publish: F,
    ) -> Result<bool, QueueError>
    where
        F: FnOnce(&SessionState),
    {
        self.publish(queue, TransitionCause::Advanced, before_publish)
    }

    /// Run this phase.
    ///
    /// `Ready` suspends until advanced. Timed phases report progress every
    /// `progress_interval` and publish the next state when the deadline
    /// passes. Returns early, without publishing, once `cancel` fires or the
    /// phase has been advanced.
    pub async fn enter<F>(
        &self,
        queue: &NotificationQueue,
        cancel: &CancellationToken,
        progress_interval: Duration,
        mut on_progress: F,
    ) -> Result<(), QueueError>
    where
        F: FnMut(ProgressEvent),
    {
        let Some(total) = self.duration() else {
            debug!("Waiting for a session to start");
            tokio::select! {
                _ = self.stop_timer.cancelled() => {}
                _ = cancel.cancelled() => {}
            }
            return Ok(());
        };

        debug!(phase = %self.phase, ?total, "Phase timer started");

        let started = Instant::now();
        let deadline = tokio::time::sleep_until(started + total);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(phase = %self.phase, "Phase timer cancelled");
                    return Ok(());
                }

                _ = self.stop_timer.cancelled() => {
                    debug!(phase = %self.phase, elapsed = ?started.elapsed(), "Phase timer stopped early");
                    return Ok(());
                }

                _ = &mut deadline => {
                    self.publish(queue, TransitionCause::Completed, |_| {})?;
                    return Ok(());
                }

                _ = ticker.tick() => {
                    if self.is_retired() {
                        return Ok(());
                    }
                    let elapsed = started.elapsed().min(total);
                    trace!(phase = %self.phase, ?elapsed, "Progress");
                    on_progress(ProgressEvent::new(
                        self.kind(),
                        self.round_counter(),
                        elapsed,
                        total,
                    ));
                }
            }
        }
    }

    fn publish<F>(
        &self,
        queue: &NotificationQueue,
        cause: TransitionCause,
        before_publish: F,
    ) -> Result<bool, QueueError>
    where
        F: FnOnce(&SessionState),
    {
        if self.published.swap(true, Ordering::AcqRel) {
            debug!(phase = %self.phase, ?cause, "Transition already published");
            return Ok(false);
        }
        self.stop_timer.cancel();
        before_publish(self);

        let next = SessionState::new(self.phase.next(&self.policy), self.policy.clone());
        debug!(from = %self.phase, to = %next.phase, ?cause, "Publishing transition");
        queue.enqueue(Notification::new(next, cause))?;
        Ok(true)
    }
}

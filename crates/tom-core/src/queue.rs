//! Notification queue
//!
//! Unbounded FIFO hand-off between whoever decides a transition (a phase
//! timer, or an advance request) and the engine's driver loop, which is the
//! only consumer.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{QueueError, SessionState};

/// Why a transition happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// The phase ran its full duration
    Completed,
    /// Someone asked to move on early
    Advanced,
}

/// Envelope carrying the state to transition to
#[derive(Debug)]
pub struct Notification {
    state: SessionState,
    cause: TransitionCause,
}

impl Notification {
    pub fn new(state: SessionState, cause: TransitionCause) -> Self {
        Self { state, cause }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn cause(&self) -> TransitionCause {
        self.cause
    }

    pub fn into_parts(self) -> (SessionState, TransitionCause) {
        (self.state, self.cause)
    }
}

/// Multi-producer, single-consumer notification queue.
///
/// `enqueue` never blocks and never drops. The consumer half is taken once
/// with [`take_receiver`](Self::take_receiver).
#[derive(Debug)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Notification>,
    rx: Mutex<Option<NotificationReceiver>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(NotificationReceiver { rx })),
        }
    }

    /// Queue a notification behind any already pending
    pub fn enqueue(&self, notification: Notification) -> Result<(), QueueError> {
        self.tx.send(notification).map_err(|_| QueueError::Closed)
    }

    /// Take the consumer half (can only be called once)
    pub fn take_receiver(&self) -> Option<NotificationReceiver> {
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer half of a [`NotificationQueue`]
#[derive(Debug)]
pub struct NotificationReceiver {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl NotificationReceiver {
    /// Wait for the next notification.
    ///
    /// Cancellation wins over a pending item, so nothing is consumed once
    /// shutdown has begun.
    pub async fn dequeue(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Notification, QueueError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(QueueError::Cancelled),
            notification = self.rx.recv() => notification.ok_or(QueueError::Closed),
        }
    }

    /// Take the next notification if one is already pending
    pub fn try_dequeue(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }
}

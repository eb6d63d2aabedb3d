//! Error types for the engine and its notification queue

use thiserror::Error;

/// Notification queue errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The consumer side is gone; the notification was not delivered
    #[error("Notification queue closed")]
    Closed,

    /// Dequeue observed cooperative cancellation (expected on shutdown)
    #[error("Dequeue cancelled")]
    Cancelled,

    #[error("Notification receiver already taken")]
    ReceiverTaken,
}

/// Engine lifecycle and driver loop errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Engine not started")]
    NotStarted,

    #[error("Engine is not running")]
    NotRunning,

    #[error("Engine already stopped")]
    AlreadyStopped,

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Driver loop panicked: {0}")]
    LoopPanicked(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

//! Pomodoro engine for tom
//!
//! This crate is the heart of tom, containing:
//! - Session state machine (Ready -> Working -> ShortBreak/LongBreak -> Working ...)
//! - The notification queue that hands "next state" messages to the driver loop
//! - The engine that hosts the driver loop and republishes events to observers
//! - Cooperative cancellation for prompt, joined shutdown

mod engine;
mod error;
mod events;
mod queue;
mod session;

pub use engine::*;
pub use error::*;
pub use events::*;
pub use queue::*;
pub use session::*;

//! Shared utilities for tom
//!
//! This crate provides:
//! - Default config file path
//! - Time helpers (wall-clock now, countdown formatting)

mod paths;
mod time;

pub use paths::*;
pub use time::*;

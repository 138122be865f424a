//! Core logic for the imgur-sweep binary.
//!
//! The interesting part lives in [`sweep`]: a sequential loop that scans the
//! account's post grid in visual order (top row first, then left to right),
//! deletes or simulates deleting one post at a time, and returns to the grid
//! between posts. Everything else is support: JSON config, saved-session
//! files, the first-run wizard and the interactive login flow.

pub mod config;
pub mod grid;
pub mod login;
pub mod session;
pub mod setup;
pub mod sweep;

// Re-export commonly used types for external use
pub use config::SweepConfig;
pub use sweep::{run_sweep, SweepSummary, SCROLL_RETRY_LIMIT};

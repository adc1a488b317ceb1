//! Registry of spawned dispatch runs.
//!
//! Each run executes on its own task. Its handle exposes the cancellation
//! token, the live progress channel and the terminal report.

mod manager;

pub use manager::{RunHandle, RunManager};

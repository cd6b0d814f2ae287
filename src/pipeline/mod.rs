//! Run pipeline.
//!
//! - `FetchOrchestrator`: fetch, classify and extract every target concurrently
//! - `diff`: turn results into the next state and change events
//! - `SpamGuard`: suppress runs with too many simultaneous changes
//! - `run_monitor`: drive one complete run
//! - `write_check_artifacts`: dump one inspected page for offline debugging

pub mod check;
pub mod diff;
pub mod monitor;
pub mod orchestrate;
pub mod spam_guard;

pub use check::{CheckMeta, write_check_artifacts};
pub use diff::{DiffCalculator, DiffOutcome, diff};
pub use monitor::{RunOptions, RunReport, run_monitor};
pub use orchestrate::{FetchOrchestrator, TargetDetail};
pub use spam_guard::{SpamGuard, SpamGuardResult};

// src/models/mod.rs

//! Domain models for the monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod event;
mod outcome;
mod signature;
mod state;
mod target;

// Re-export all public types
pub use config::{
    CandidateStrategy, Config, DetectorConfig, ExtractionConfig, MonitorConfig, NotifyConfig,
    NotifyMode, PathsConfig,
};
pub use event::ChangeEvent;
pub use outcome::{
    Classification, ClassifiedOutcome, FailureReason, FetchOutcome, FetchStatus, PageSnapshot,
    TargetOutcome, TargetResult,
};
pub use signature::{Confidence, Signature, short_hash};
pub use state::{State, StateRecord};
pub use target::{Target, TargetEntry, TargetKind, load_targets, normalize_targets, parse_targets};

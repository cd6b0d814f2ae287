// src/lib.rs

//! pagewatch: watches remote pages and reports real content changes.
//!
//! A run loads the target list and the last known state, fetches every
//! target with bounded concurrency, derives a content signature per page,
//! compares it with the stored one and notifies about confirmed changes.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

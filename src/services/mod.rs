//! Service layer for the monitor.
//!
//! This module contains the per-page building blocks:
//! - Signature extraction (`SignatureExtractor`)
//! - Challenge page detection (`BlockDetector`)
//! - Page fetching (`PageFetcher`, `HttpPageFetcher`)
//! - Notification delivery (`Notifier`, `TelegramNotifier`)

mod detector;
mod extractor;
mod fetcher;
mod notifier;

pub use detector::BlockDetector;
pub use extractor::{BlockMatch, SignatureExtractor};
pub use fetcher::{HttpPageFetcher, PageFetcher, ResourcePolicy, ResourceType};
pub use notifier::{Notifier, TelegramNotifier, compose_messages, deliver};

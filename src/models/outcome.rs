// src/models/outcome.rs

//! Per-target fetch observations and results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Signature, Target};

/// What a page fetcher observed for one navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub http_status: Option<u16>,
    pub page_title: Option<String>,
    /// Visible text, one rendered line per text block
    pub rendered_text: String,
    /// Document markup, empty when the fetcher only exposes text
    pub html: String,
    pub final_url: Option<String>,
}

/// Raw observation from one navigation attempt. Not persisted.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub target: Target,
    pub snapshot: PageSnapshot,
}

/// Detector verdict for a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Ok,
    Blocked { reason: String },
    ParseFailure { reason: String },
}

/// Transport-level status of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Ok,
    Blocked,
    Timeout,
    TransportError,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchStatus::Ok => "ok",
            FetchStatus::Blocked => "blocked",
            FetchStatus::Timeout => "timeout",
            FetchStatus::TransportError => "transport error",
        })
    }
}

/// A fetch outcome tagged with its status.
#[derive(Debug, Clone)]
pub struct ClassifiedOutcome {
    pub outcome: FetchOutcome,
    pub status: FetchStatus,
}

impl ClassifiedOutcome {
    pub fn snapshot(&self) -> &PageSnapshot {
        &self.outcome.snapshot
    }
}

/// Human-readable reason a target produced no signature this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    Transport(String),
    Blocked(String),
    ParseFailure(String),
    Extraction(String),
}

impl FailureReason {
    pub fn is_blocked(&self) -> bool {
        matches!(self, FailureReason::Blocked(_))
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Transport(msg) => write!(f, "transport error: {msg}"),
            FailureReason::Blocked(msg) => write!(f, "blocked: {msg}"),
            FailureReason::ParseFailure(msg) => write!(f, "parse failure: {msg}"),
            FailureReason::Extraction(msg) => write!(f, "extraction failed: {msg}"),
        }
    }
}

/// Terminal state of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Ok(Signature),
    Failed(FailureReason),
}

/// Result of driving one target through the fetch state machine.
#[derive(Debug, Clone)]
pub struct TargetResult {
    pub target: Target,
    pub outcome: TargetOutcome,
    /// Navigations performed, including overlay reloads and retries
    pub attempts: u32,
}

impl TargetResult {
    pub fn ok(target: Target, signature: Signature) -> Self {
        Self {
            target,
            outcome: TargetOutcome::Ok(signature),
            attempts: 1,
        }
    }

    pub fn failed(target: Target, reason: FailureReason) -> Self {
        Self {
            target,
            outcome: TargetOutcome::Failed(reason),
            attempts: 1,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn signature(&self) -> Option<&Signature> {
        match &self.outcome {
            TargetOutcome::Ok(sig) => Some(sig),
            TargetOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            TargetOutcome::Ok(_) => None,
            TargetOutcome::Failed(reason) => Some(reason),
        }
    }

    /// Status of the last navigation behind this result.
    ///
    /// Pages that loaded but yielded no signature still count as `Ok`.
    pub fn status(&self) -> FetchStatus {
        match self.failure() {
            Some(FailureReason::Timeout) => FetchStatus::Timeout,
            Some(FailureReason::Transport(_)) => FetchStatus::TransportError,
            Some(FailureReason::Blocked(_)) => FetchStatus::Blocked,
            _ => FetchStatus::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetKind;

    #[test]
    fn test_failure_reason_display_is_verbatim() {
        let reason = FailureReason::Extraction("no comment counter found".into());
        assert_eq!(reason.to_string(), "extraction failed: no comment counter found");
        assert_eq!(FailureReason::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_accessors() {
        let target = Target::new("a", TargetKind::FullDocumentHash, "https://example.com");
        let ok = TargetResult::ok(target.clone(), Signature::new("abc"));
        assert!(ok.signature().is_some());
        assert!(ok.failure().is_none());

        let failed = TargetResult::failed(target, FailureReason::Blocked("403".into()));
        assert!(failed.failure().unwrap().is_blocked());
    }

    #[test]
    fn test_status_follows_failure() {
        let target = Target::new("a", TargetKind::FullDocumentHash, "https://example.com");
        let status = |reason| TargetResult::failed(target.clone(), reason).status();

        assert_eq!(status(FailureReason::Timeout), FetchStatus::Timeout);
        assert_eq!(status(FailureReason::Transport("reset".into())), FetchStatus::TransportError);
        assert_eq!(status(FailureReason::Blocked("403".into())), FetchStatus::Blocked);
        assert_eq!(status(FailureReason::ParseFailure("HTTP 503".into())), FetchStatus::Ok);
        assert_eq!(
            TargetResult::ok(target.clone(), Signature::new("abc")).status(),
            FetchStatus::Ok
        );
        assert_eq!(FetchStatus::TransportError.to_string(), "transport error");
    }
}

// src/pipeline/orchestrate.rs

//! Concurrent fetch orchestration.
//!
//! Every target runs through
//! `navigate → classify → (blocked → cool-down → navigate) → extract`
//! and ends as `ok(signature)` or `failed(reason)`. At most
//! `max_concurrency` targets are in flight; errors never leave a target's
//! own result.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::FetchError;
use crate::models::{
    Classification, ClassifiedOutcome, Confidence, FailureReason, FetchOutcome, FetchStatus,
    MonitorConfig, PageSnapshot, Target, TargetResult,
};
use crate::services::{BlockDetector, PageFetcher, ResourceType, SignatureExtractor};

/// Detailed result of one target, keeping the last page seen for diagnostics.
#[derive(Debug, Clone)]
pub struct TargetDetail {
    pub result: TargetResult,
    /// Last page observed, tagged `Ok` or `Blocked`
    pub page: Option<ClassifiedOutcome>,
    pub classification: Option<Classification>,
    /// A consent overlay was dismissed and the page reloaded
    pub overlay_dismissed: bool,
}

/// Drives fetch, classification and extraction over all targets.
pub struct FetchOrchestrator {
    config: MonitorConfig,
    fetcher: Arc<dyn PageFetcher>,
    detector: BlockDetector,
    extractor: SignatureExtractor,
}

impl FetchOrchestrator {
    pub fn new(
        config: MonitorConfig,
        fetcher: Arc<dyn PageFetcher>,
        detector: BlockDetector,
        extractor: SignatureExtractor,
    ) -> Self {
        Self {
            config,
            fetcher,
            detector,
            extractor,
        }
    }

    /// Fetch all targets under the concurrency bound.
    ///
    /// Results come back in completion order.
    pub async fn run(&self, targets: &[Target]) -> Vec<TargetResult> {
        let concurrency = self.config.max_concurrency.max(1);
        let policy = self.fetcher.resource_policy();
        let declined: Vec<String> = [
            ResourceType::Stylesheet,
            ResourceType::Script,
            ResourceType::Image,
            ResourceType::Media,
            ResourceType::Font,
        ]
        .into_iter()
        .filter(|r| policy.blocks(*r))
        .map(|r| format!("{r:?}").to_lowercase())
        .collect();
        log::info!(
            "Fetching {} target(s) with concurrency {} (declining: {})",
            targets.len(),
            concurrency,
            if declined.is_empty() {
                "nothing".to_string()
            } else {
                declined.join(", ")
            }
        );

        stream::iter(targets)
            .map(|target| self.fetch_target(target))
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    /// Fetch a single target to a terminal result.
    pub async fn fetch_target(&self, target: &Target) -> TargetResult {
        let detail = self.inspect(target).await;
        match detail.result.failure() {
            None => log::info!(
                "[{}] ok ({}, {} attempt(s))",
                target.name,
                describe(&detail.result),
                detail.result.attempts
            ),
            Some(reason) => log::warn!(
                "[{}] failed ({}): {}",
                target.name,
                detail.result.status(),
                reason
            ),
        }
        detail.result
    }

    /// Fetch a single target and keep the observed page.
    pub async fn inspect(&self, target: &Target) -> TargetDetail {
        let stagger = self.config.stagger();
        if !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }

        let mut attempts = 0u32;
        let mut blocked_retries = 0u32;
        let mut overlay_dismissed = false;

        loop {
            let snapshot = match self.observe(target, &mut attempts, &mut overlay_dismissed).await {
                Ok(snapshot) => snapshot,
                Err(reason) => {
                    return TargetDetail {
                        result: TargetResult::failed(target.clone(), reason)
                            .with_attempts(attempts),
                        page: None,
                        classification: None,
                        overlay_dismissed,
                    };
                }
            };

            let classification = self.detector.classify_snapshot(&snapshot);
            let page = ClassifiedOutcome {
                outcome: FetchOutcome {
                    target: target.clone(),
                    snapshot,
                },
                status: match classification {
                    Classification::Blocked { .. } => FetchStatus::Blocked,
                    _ => FetchStatus::Ok,
                },
            };
            let outcome = match &classification {
                Classification::Blocked { reason } => {
                    if blocked_retries < self.config.retry_count {
                        blocked_retries += 1;
                        log::warn!(
                            "[{}] blocked ({}), retrying after {} ms",
                            target.name,
                            reason,
                            self.config.retry_cooldown_ms
                        );
                        tokio::time::sleep(self.config.retry_cooldown()).await;
                        continue;
                    }
                    TargetResult::failed(target.clone(), FailureReason::Blocked(reason.clone()))
                }
                Classification::ParseFailure { reason } => TargetResult::failed(
                    target.clone(),
                    FailureReason::ParseFailure(reason.clone()),
                ),
                Classification::Ok => self.extract(&page),
            };

            return TargetDetail {
                result: outcome.with_attempts(attempts),
                page: Some(page),
                classification: Some(classification),
                overlay_dismissed,
            };
        }
    }

    fn extract(&self, page: &ClassifiedOutcome) -> TargetResult {
        let target = &page.outcome.target;
        match self.extractor.extract(target.kind, page) {
            Ok(signature) => TargetResult::ok(target.clone(), signature),
            Err(failure) => {
                TargetResult::failed(target.clone(), FailureReason::Extraction(failure.reason))
            }
        }
    }

    /// Navigate, settle, and reload once if an overlay was dismissed.
    async fn observe(
        &self,
        target: &Target,
        attempts: &mut u32,
        overlay_dismissed: &mut bool,
    ) -> Result<PageSnapshot, FailureReason> {
        let mut snapshot = self.navigate(&target.url, attempts).await?;

        if !self.config.consent_selectors.is_empty()
            && self
                .fetcher
                .dismiss_overlay(&target.url, &self.config.consent_selectors)
                .await
        {
            log::debug!("[{}] overlay dismissed, reloading", target.name);
            *overlay_dismissed = true;
            match self.navigate(&target.url, attempts).await {
                Ok(reloaded) => snapshot = reloaded,
                Err(reason) => log::debug!("[{}] reload failed: {}", target.name, reason),
            }
        }

        Ok(snapshot)
    }

    async fn navigate(&self, url: &str, attempts: &mut u32) -> Result<PageSnapshot, FailureReason> {
        *attempts += 1;
        let timeout = self.config.nav_timeout();
        let snapshot = match tokio::time::timeout(timeout, self.fetcher.navigate(url, timeout)).await
        {
            Err(_elapsed) => return Err(FailureReason::Timeout),
            Ok(Err(e)) => return Err(failure_from_fetch(e)),
            Ok(Ok(snapshot)) => snapshot,
        };

        let settle = self.config.settle();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        Ok(snapshot)
    }
}

fn failure_from_fetch(error: FetchError) -> FailureReason {
    match error {
        FetchError::Timeout => FailureReason::Timeout,
        FetchError::Transport(msg) => FailureReason::Transport(msg),
        FetchError::Unusable(msg) => FailureReason::ParseFailure(msg),
    }
}

fn describe(result: &TargetResult) -> String {
    match result.signature() {
        Some(sig) => match sig.numeric_count {
            Some(count) => format!("count {count}"),
            None => format!(
                "{} via {}{}",
                sig.short_id(),
                sig.strategy.as_deref().unwrap_or("?"),
                if sig.confidence == Confidence::Fallback {
                    ", low confidence"
                } else {
                    ""
                }
            ),
        },
        None => String::new(),
    }
}

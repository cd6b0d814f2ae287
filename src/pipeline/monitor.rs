// src/pipeline/monitor.rs

//! One complete monitoring run.
//!
//! load state → fetch all targets → diff → save state → notify → report.
//! The diff runs only after every fetch has finished, so the anti-spam count
//! covers the whole run. State is committed before any message is sent.

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, Config, FailureReason, Target, TargetResult};
use crate::pipeline::{FetchOrchestrator, diff};
use crate::services::{Notifier, compose_messages, deliver};
use crate::storage::StateStore;

/// Switches for a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Fetch and diff, but neither save state nor send messages
    pub dry_run: bool,
}

/// What happened during a run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub targets: usize,
    pub ok: usize,
    /// Failed targets with their reason, sorted by name
    pub failures: Vec<(String, FailureReason)>,
    pub baselines: usize,
    pub unchanged: usize,
    /// Events cleared for delivery
    pub events: Vec<ChangeEvent>,
    /// Events withheld by the anti-spam guard
    pub suppressed: usize,
    pub messages_sent: usize,
    pub state_saved: bool,
}

impl RunReport {
    pub fn blocked(&self) -> usize {
        self.failures.iter().filter(|(_, r)| r.is_blocked()).count()
    }

    /// Strictly more than half of all targets were blocked.
    pub fn majority_blocked(&self) -> bool {
        self.targets > 0 && self.blocked() * 2 > self.targets
    }

    fn log_summary(&self) {
        log::info!(
            "Run complete: {} target(s), {} ok, {} failed ({} blocked), {} baseline(s), {} unchanged, {} event(s), {} suppressed",
            self.targets,
            self.ok,
            self.failures.len(),
            self.blocked(),
            self.baselines,
            self.unchanged,
            self.events.len(),
            self.suppressed
        );
        if self.majority_blocked() {
            log::warn!(
                "{} of {} targets were blocked: the remote service appears to be blocking us",
                self.blocked(),
                self.targets
            );
        }
    }
}

/// Execute a full run against `targets`.
///
/// Per-target failures are reported, never returned as errors. Errors come
/// only from an empty target list or the state store.
pub async fn run_monitor(
    config: &Config,
    targets: &[Target],
    orchestrator: &FetchOrchestrator,
    store: &dyn StateStore,
    notifier: Option<&dyn Notifier>,
    options: RunOptions,
) -> Result<RunReport> {
    if targets.is_empty() {
        return Err(AppError::config("target list is empty"));
    }

    let prior = store.load().await?;
    log::info!(
        "Loaded state with {} record(s); monitoring {} target(s)",
        prior.len(),
        targets.len()
    );

    let results = orchestrator.run(targets).await;
    let outcome = diff(
        &prior,
        &results,
        config.monitor.anti_spam_threshold,
        Utc::now(),
    );

    for url in &outcome.baselines {
        log::info!("Baseline recorded for {}", url);
    }
    if outcome.is_suppressed() {
        log::warn!(
            "{} change(s) withheld this run; state still moves to the new values",
            outcome.change_count()
        );
    }

    let mut report = RunReport {
        targets: targets.len(),
        ok: results.iter().filter(|r| r.signature().is_some()).count(),
        failures: failures(&results),
        baselines: outcome.baselines.len(),
        unchanged: outcome.unchanged,
        events: outcome.events.clone(),
        suppressed: outcome.suppressed.len(),
        ..RunReport::default()
    };

    if options.dry_run {
        log::info!("Dry run: state not saved");
    } else {
        store.save(&outcome.state).await?;
        report.state_saved = true;
    }

    let messages = compose_messages(
        &outcome.events,
        config.notify.mode,
        config.notify.max_message_chars,
    );
    if !messages.is_empty() {
        match notifier {
            _ if options.dry_run => {
                for message in &messages {
                    log::info!("Dry run, would send:\n{}", message);
                }
            }
            Some(notifier) => {
                report.messages_sent = deliver(notifier, &messages).await;
                if report.messages_sent < messages.len() {
                    log::warn!(
                        "Delivered {} of {} message(s)",
                        report.messages_sent,
                        messages.len()
                    );
                }
            }
            None => log::warn!(
                "Notification credentials missing, skipped sending {} message(s)",
                messages.len()
            ),
        }
    }

    report.log_summary();
    Ok(report)
}

fn failures(results: &[TargetResult]) -> Vec<(String, FailureReason)> {
    let mut failed: Vec<_> = results
        .iter()
        .filter_map(|r| r.failure().map(|f| (r.target.name.clone(), f.clone())))
        .collect();
    failed.sort_by(|a, b| a.0.cmp(&b.0));
    failed
}

//! Run-level anti-spam guard.
//!
//! When too many targets change in the same run the changes are most likely
//! caused by a site-wide layout shift or a wave of challenge pages rather than
//! real activity. The guard then suppresses every event of the run, while the
//! state is still committed so the next run compares against the new values.

/// Result of an anti-spam check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpamGuardResult {
    /// No changes this run
    Quiet,
    /// Changes are few enough to report
    Pass { count: usize },
    /// Too many simultaneous changes, drop all events
    Suppressed { count: usize, threshold: usize },
}

impl SpamGuardResult {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, SpamGuardResult::Suppressed { .. })
    }
}

/// Decides whether a run's change events may be delivered.
#[derive(Debug, Clone)]
pub struct SpamGuard {
    /// Simultaneous changes at or above which events are suppressed.
    /// Zero disables the guard.
    threshold: usize,
}

impl Default for SpamGuard {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SpamGuard {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Check a run with `count` candidate events.
    pub fn check(&self, count: usize) -> SpamGuardResult {
        if count == 0 {
            return SpamGuardResult::Quiet;
        }
        let threshold = self.threshold;
        if threshold > 0 && count >= threshold {
            return SpamGuardResult::Suppressed { count, threshold };
        }
        SpamGuardResult::Pass { count }
    }

    /// Check and log the verdict. Returns true when events may be sent.
    pub fn allow(&self, count: usize) -> bool {
        match self.check(count) {
            SpamGuardResult::Quiet => true,
            SpamGuardResult::Pass { count } => {
                log::info!("Anti-spam: {} change(s), delivering", count);
                true
            }
            SpamGuardResult::Suppressed { count, threshold } => {
                log::warn!(
                    "Anti-spam: {} simultaneous changes >= threshold {}, suppressing notifications",
                    count,
                    threshold
                );
                false
            }
        }
    }
}

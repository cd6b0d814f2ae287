//! State diff and notification policy.
//!
//! Compares the run's results against the persisted state, producing the
//! next state and the change events worth reporting.
//!
//! Rules per target:
//! - only `ok` results touch the state; failed targets keep their record
//! - a URL absent from the prior state is a baseline and never an event
//! - `comment_count` reports only a strict increase of the counter
//! - hash kinds report any change of `stable_id`
//!
//! The run-level [`SpamGuard`] then decides whether the events go out at all.
//! The state is committed either way.

use chrono::{DateTime, Utc};

use crate::models::{
    ChangeEvent, Signature, State, StateRecord, Target, TargetKind, TargetResult, short_hash,
};
use crate::pipeline::SpamGuard;

/// Output of the diff phase.
#[derive(Debug, Clone, Default)]
pub struct DiffOutcome {
    /// State to persist for the next run
    pub state: State,
    /// Events cleared for delivery, in a deterministic order
    pub events: Vec<ChangeEvent>,
    /// Events withheld by the anti-spam guard
    pub suppressed: Vec<ChangeEvent>,
    /// URLs recorded for the first time (or re-baselined)
    pub baselines: Vec<String>,
    /// Targets fetched successfully whose comparison value did not move
    pub unchanged: usize,
}

impl DiffOutcome {
    /// Number of targets that qualified for an event, before anti-spam.
    pub fn change_count(&self) -> usize {
        self.events.len() + self.suppressed.len()
    }

    pub fn is_suppressed(&self) -> bool {
        !self.suppressed.is_empty()
    }
}

/// Verdict for one successfully fetched target.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Baseline,
    Unchanged,
    Changed(ChangeEvent),
}

/// Calculator for the state diff.
#[derive(Debug, Clone, Default)]
pub struct DiffCalculator {
    guard: SpamGuard,
}

impl DiffCalculator {
    pub fn new(anti_spam_threshold: usize) -> Self {
        Self {
            guard: SpamGuard::new(anti_spam_threshold),
        }
    }

    /// Calculate the next state and events.
    pub fn calculate(
        &self,
        prior: &State,
        results: &[TargetResult],
        now: DateTime<Utc>,
    ) -> DiffOutcome {
        let mut state = prior.clone();
        let mut events = Vec::new();
        let mut baselines = Vec::new();
        let mut unchanged = 0;

        for result in results {
            let Some(signature) = result.signature() else {
                continue;
            };
            let target = &result.target;
            let previous = prior.get(&target.url);

            match evaluate(previous, target, signature) {
                Verdict::Baseline => baselines.push(target.url.clone()),
                Verdict::Unchanged => unchanged += 1,
                Verdict::Changed(event) => events.push(event),
            }

            let record = match previous {
                Some(record) if record.kind == target.kind && record.signature == *signature => {
                    StateRecord {
                        name: target.name.clone(),
                        ..record.clone()
                    }
                }
                _ => StateRecord::new(target, signature.clone(), now),
            };
            state.insert(target.url.clone(), record);
        }

        events.sort_by(|a, b| {
            a.target_name
                .cmp(&b.target_name)
                .then_with(|| a.url.cmp(&b.url))
        });
        baselines.sort();

        let (events, suppressed) = if self.guard.allow(events.len()) {
            (events, Vec::new())
        } else {
            (Vec::new(), events)
        };

        DiffOutcome {
            state,
            events,
            suppressed,
            baselines,
            unchanged,
        }
    }
}

/// Diff `results` against `prior` with the given anti-spam threshold.
pub fn diff(
    prior: &State,
    results: &[TargetResult],
    anti_spam_threshold: usize,
    now: DateTime<Utc>,
) -> DiffOutcome {
    DiffCalculator::new(anti_spam_threshold).calculate(prior, results, now)
}

fn evaluate(previous: Option<&StateRecord>, target: &Target, current: &Signature) -> Verdict {
    let Some(previous) = previous else {
        return Verdict::Baseline;
    };
    if previous.kind != target.kind {
        return Verdict::Baseline;
    }

    match target.kind {
        TargetKind::CommentCount => {
            match (previous.signature.numeric_count, current.numeric_count) {
                (Some(before), Some(after)) if after > before => Verdict::Changed(event(
                    target,
                    before.to_string(),
                    after.to_string(),
                    current,
                )),
                (Some(_), Some(_)) => Verdict::Unchanged,
                _ => Verdict::Baseline,
            }
        }
        TargetKind::LatestCommentBlock | TargetKind::FullDocumentHash => {
            if previous.signature.stable_id == current.stable_id {
                Verdict::Unchanged
            } else {
                Verdict::Changed(event(
                    target,
                    short_hash(&previous.signature.stable_id).to_string(),
                    short_hash(&current.stable_id).to_string(),
                    current,
                ))
            }
        }
    }
}

fn event(target: &Target, previous: String, current: String, signature: &Signature) -> ChangeEvent {
    ChangeEvent {
        target_name: target.name.clone(),
        url: target.url.clone(),
        kind: target.kind,
        previous,
        current,
        preview: signature.preview.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    use crate::models::FailureReason;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn t1() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap()
    }

    fn count_target(name: &str) -> Target {
        Target::new(name, TargetKind::CommentCount, format!("https://example.com/{name}"))
    }

    fn hash_target(name: &str) -> Target {
        Target::new(name, TargetKind::FullDocumentHash, format!("https://example.com/{name}"))
    }

    fn count_sig(n: u64) -> Signature {
        Signature::new(format!("count-{n}")).with_count(n)
    }

    fn record(target: &Target, signature: Signature) -> (String, StateRecord) {
        (target.url.clone(), StateRecord::new(target, signature, t0()))
    }

    #[test]
    fn test_concrete_scenario() {
        let a = count_target("A");
        let b = hash_target("B");
        let prior: State = [
            record(&a, count_sig(100)),
            record(&b, Signature::new("h0")),
        ]
        .into_iter()
        .collect();
        let results = vec![
            TargetResult::ok(a.clone(), count_sig(105)),
            TargetResult::ok(b.clone(), Signature::new("h0")),
        ];

        let out = diff(&prior, &results, 2, t1());

        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].target_name, "A");
        assert_eq!(out.events[0].previous, "100");
        assert_eq!(out.events[0].current, "105");
        assert!(out.suppressed.is_empty());
        assert_eq!(out.unchanged, 1);
        assert_eq!(out.state[&a.url].signature.numeric_count, Some(105));
        assert_eq!(out.state[&a.url].updated_at, Some(t1()));
        assert_eq!(out.state[&b.url].signature.stable_id, "h0");
        assert_eq!(out.state[&b.url].updated_at, Some(t0()));
    }

    #[test]
    fn test_empty_prior_is_all_baselines() {
        let results: Vec<_> = (0..5)
            .map(|i| TargetResult::ok(hash_target(&format!("t{i}")), Signature::new(format!("h{i}"))))
            .collect();

        let out = diff(&State::new(), &results, 2, t0());

        assert!(out.events.is_empty());
        assert!(out.suppressed.is_empty());
        assert_eq!(out.baselines.len(), 5);
        assert_eq!(out.state.len(), 5);
    }

    #[test]
    fn test_new_target_next_to_known_ones_is_baseline() {
        let known = hash_target("known");
        let prior: State = [record(&known, Signature::new("h0"))].into_iter().collect();
        let results = vec![
            TargetResult::ok(known.clone(), Signature::new("h0")),
            TargetResult::ok(hash_target("fresh"), Signature::new("anything")),
        ];

        let out = diff(&prior, &results, 2, t1());

        assert!(out.events.is_empty());
        assert_eq!(out.baselines, vec!["https://example.com/fresh".to_string()]);
    }

    #[test]
    fn test_count_monotonicity() {
        let a = count_target("A");
        let prior: State = [record(&a, count_sig(793))].into_iter().collect();

        let same = diff(&prior, &[TargetResult::ok(a.clone(), count_sig(793))], 2, t1());
        assert!(same.events.is_empty());
        assert_eq!(same.state, prior);

        let up = diff(&prior, &[TargetResult::ok(a.clone(), count_sig(800))], 2, t1());
        assert_eq!(up.events.len(), 1);
        assert_eq!(up.events[0].current, "800");

        // A decrease is accepted silently but still recorded.
        let down = diff(&prior, &[TargetResult::ok(a.clone(), count_sig(790))], 2, t1());
        assert!(down.events.is_empty());
        assert_eq!(down.state[&a.url].signature.numeric_count, Some(790));
    }

    #[test]
    fn test_hash_change_fires() {
        let b = hash_target("B");
        let prior: State = [record(&b, Signature::new("aaaaaaaaaaaaaaaa"))]
            .into_iter()
            .collect();

        let out = diff(
            &prior,
            &[TargetResult::ok(b.clone(), Signature::new("bbbbbbbbbbbbbbbb"))],
            2,
            t1(),
        );

        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].previous, "aaaaaaaaaaaa");
        assert_eq!(out.events[0].current, "bbbbbbbbbbbb");
    }

    #[test]
    fn test_anti_spam_suppresses_but_commits() {
        let a = hash_target("A");
        let b = hash_target("B");
        let c = hash_target("C");
        let prior: State = [
            record(&a, Signature::new("a0")),
            record(&b, Signature::new("b0")),
            record(&c, Signature::new("c0")),
        ]
        .into_iter()
        .collect();
        let results = vec![
            TargetResult::ok(a.clone(), Signature::new("a1")),
            TargetResult::ok(b.clone(), Signature::new("b1")),
            TargetResult::ok(c.clone(), Signature::new("c0")),
        ];

        let out = diff(&prior, &results, 2, t1());

        assert!(out.events.is_empty());
        assert_eq!(out.suppressed.len(), 2);
        assert!(out.is_suppressed());
        assert_eq!(out.state[&a.url].signature.stable_id, "a1");
        assert_eq!(out.state[&b.url].signature.stable_id, "b1");

        // Raising the threshold lets both through.
        let out = diff(&prior, &results, 3, t1());
        assert_eq!(out.events.len(), 2);
    }

    #[test]
    fn test_failed_targets_keep_their_record() {
        let x = hash_target("X");
        let y = hash_target("Y");
        let prior: State = [
            record(&x, Signature::new("x0")),
            record(&y, Signature::new("y0")),
        ]
        .into_iter()
        .collect();
        let results = vec![
            TargetResult::failed(x.clone(), FailureReason::Blocked("HTTP 403".into())),
            TargetResult::ok(y.clone(), Signature::new("y1")),
        ];

        let out = diff(&prior, &results, 2, t1());

        assert_eq!(out.state[&x.url], prior[&x.url]);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].target_name, "Y");
    }

    #[test]
    fn test_failed_new_target_not_recorded() {
        let out = diff(
            &State::new(),
            &[TargetResult::failed(hash_target("X"), FailureReason::Timeout)],
            2,
            t0(),
        );
        assert!(out.state.is_empty());
        assert!(out.baselines.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let a = count_target("A");
        let b = hash_target("B");
        let prior: State = [
            record(&a, count_sig(10)),
            record(&b, Signature::new("h0")),
        ]
        .into_iter()
        .collect();
        let results = vec![
            TargetResult::ok(a.clone(), count_sig(12)),
            TargetResult::ok(b.clone(), Signature::new("h0")),
        ];

        let first = diff(&prior, &results, 0, t1());
        let again = diff(&prior, &results, 0, t1());
        assert_eq!(first.state, again.state);
        assert_eq!(first.events, again.events);

        // Feeding the committed state back yields no new events.
        let next = diff(&first.state, &results, 0, t1());
        assert!(next.events.is_empty());
        assert_eq!(next.state, first.state);
    }

    #[test]
    fn test_event_order_is_deterministic() {
        let targets: Vec<_> = ["zeta", "alpha", "mid"].iter().map(|n| hash_target(n)).collect();
        let prior: State = targets
            .iter()
            .map(|t| record(t, Signature::new("old")))
            .collect();
        let mut results: Vec<_> = targets
            .iter()
            .map(|t| TargetResult::ok(t.clone(), Signature::new("new")))
            .collect();

        let forward = diff(&prior, &results, 0, t1());
        results.reverse();
        let backward = diff(&prior, &results, 0, t1());

        let names: Vec<_> = forward.events.iter().map(|e| e.target_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(forward.events, backward.events);
    }

    #[test]
    fn test_kind_switch_rebaselines() {
        let url = "https://example.com/p";
        let before = Target::new("P", TargetKind::FullDocumentHash, url);
        let after = Target::new("P", TargetKind::CommentCount, url);
        let prior: State = [record(&before, Signature::new("h0"))].into_iter().collect();

        let out = diff(&prior, &[TargetResult::ok(after, count_sig(4))], 2, t1());

        assert!(out.events.is_empty());
        assert_eq!(out.baselines, vec![url.to_string()]);
        assert_eq!(out.state[url].kind, TargetKind::CommentCount);
    }
}

//! Chronological reduction: completed runs into CFR, duration, and
//! incident (MTTR) rows.
//!
//! The reducer is a pure function over one repository's run set. It sorts,
//! then walks the history once, pairing every failure with the next later
//! success. Pairing is many-to-one by design: all open failures before a
//! success are resolved by that same success ("first failure, first
//! resolved"), never a one-success-consumes-one-failure exchange.

use tracing::debug;

use crate::error::Anomaly;
use crate::model::{CfrSample, CompletedRun, DurationSample, Incident};

/// Everything one reduction pass derives from a repository's run history.
#[derive(Debug, Default)]
pub struct RunReduction {
    /// One row per run, mutable on re-ingestion.
    pub cfr: Vec<CfrSample>,
    /// One row per run with a non-negative duration.
    pub durations: Vec<DurationSample>,
    /// One row per failure that has a later success.
    pub incidents: Vec<Incident>,
    /// Malformed-input reports (negative durations).
    pub anomalies: Vec<Anomaly>,
}

/// Reduce one repository's completed runs.
///
/// Input order does not matter: runs are sorted by `completed_at`
/// ascending, ties broken by `run_id` ascending, which fixes the pairing
/// order deterministically. A failure with no later success produces no
/// incident; it stays open until a later ingestion pass sees a success,
/// and the sink's write-once rule on `(repo, failed_run_id)` keeps
/// re-resolution from duplicating already-recorded incidents.
pub fn reduce_runs(mut runs: Vec<CompletedRun>) -> RunReduction {
    runs.sort_by(|a, b| {
        a.completed_at
            .cmp(&b.completed_at)
            .then(a.run_id.cmp(&b.run_id))
    });

    // next_success[i] = index of the first success strictly after i.
    // Backward sweep keeps the forward scan O(n) without changing which
    // success resolves which failure.
    let mut next_success: Vec<Option<usize>> = vec![None; runs.len()];
    let mut pending: Option<usize> = None;
    for i in (0..runs.len()).rev() {
        next_success[i] = pending;
        if runs[i].conclusion.is_success() {
            pending = Some(i);
        }
    }

    let mut reduction = RunReduction::default();

    for (i, run) in runs.iter().enumerate() {
        let duration = run
            .completed_at
            .signed_duration_since(run.started_at)
            .num_seconds();
        if duration >= 0 {
            reduction.durations.push(DurationSample {
                repo: run.repo.clone(),
                run_id: run.run_id,
                duration_seconds: duration,
                completed_at: run.completed_at,
            });
        } else {
            debug!(repo = %run.repo, run_id = run.run_id, "dropping run with negative duration");
            reduction
                .anomalies
                .push(Anomaly::NegativeDuration { run_id: run.run_id });
        }

        reduction.cfr.push(CfrSample {
            repo: run.repo.clone(),
            run_id: run.run_id,
            conclusion: run.conclusion,
            completed_at: run.completed_at,
            failure_reason: run.label.clone(),
        });

        if run.conclusion.is_failure() {
            if let Some(j) = next_success[i] {
                let resolver = &runs[j];
                let recovery = resolver
                    .completed_at
                    .signed_duration_since(run.completed_at)
                    .num_seconds();
                // Sort order guarantees recovery >= 0.
                reduction.incidents.push(Incident {
                    repo: run.repo.clone(),
                    failed_run_id: run.run_id,
                    resolved_run_id: resolver.run_id,
                    failure_time: run.completed_at,
                    resolution_time: resolver.completed_at,
                    recovery_seconds: recovery,
                });
            }
        }
    }

    reduction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RunConclusion;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, h, 0, 0).unwrap()
    }

    fn run(id: i64, conclusion: RunConclusion, started: u32, completed: u32) -> CompletedRun {
        CompletedRun {
            repo: "o/r".to_string(),
            run_id: id,
            conclusion,
            started_at: at(started),
            completed_at: at(completed),
            label: None,
        }
    }

    #[test]
    fn emits_cfr_and_duration_rows_for_every_run() {
        let runs = vec![
            run(1, RunConclusion::Success, 0, 1),
            run(2, RunConclusion::Failure, 1, 2),
            run(3, RunConclusion::Success, 2, 3),
        ];
        let out = reduce_runs(runs);
        assert_eq!(out.cfr.len(), 3);
        assert_eq!(out.durations.len(), 3);
        assert!(out.durations.iter().all(|d| d.duration_seconds == 3600));
        assert_eq!(
            out.cfr
                .iter()
                .filter(|s| s.conclusion.is_failure())
                .count(),
            1
        );
    }

    #[test]
    fn failure_pairs_with_next_success_only() {
        let runs = vec![
            run(1, RunConclusion::Failure, 0, 1),
            run(2, RunConclusion::Success, 1, 3),
            run(3, RunConclusion::Success, 3, 5),
        ];
        let out = reduce_runs(runs);
        assert_eq!(out.incidents.len(), 1);
        let incident = &out.incidents[0];
        assert_eq!(incident.failed_run_id, 1);
        assert_eq!(incident.resolved_run_id, 2);
        assert_eq!(incident.recovery_seconds, 2 * 3600);
    }

    #[test]
    fn all_open_failures_resolve_to_the_same_success() {
        // Failures at t1 < t2 < t3, single success at t4: each failure
        // records its own recovery against the one success.
        let runs = vec![
            run(1, RunConclusion::Failure, 0, 1),
            run(2, RunConclusion::Failure, 1, 2),
            run(3, RunConclusion::Failure, 2, 3),
            run(4, RunConclusion::Success, 3, 4),
        ];
        let out = reduce_runs(runs);
        assert_eq!(out.incidents.len(), 3);
        for (incident, failed_at) in out.incidents.iter().zip([1u32, 2, 3]) {
            assert_eq!(incident.resolved_run_id, 4);
            assert_eq!(incident.resolution_time, at(4));
            assert_eq!(
                incident.recovery_seconds,
                i64::from(4 - failed_at) * 3600
            );
        }
    }

    #[test]
    fn success_never_resolves_a_later_failure() {
        let runs = vec![
            run(1, RunConclusion::Success, 0, 1),
            run(2, RunConclusion::Failure, 1, 2),
        ];
        let out = reduce_runs(runs);
        assert!(out.incidents.is_empty());
    }

    #[test]
    fn unresolved_failure_emits_no_incident() {
        let out = reduce_runs(vec![run(1, RunConclusion::Failure, 0, 1)]);
        assert!(out.incidents.is_empty());
        assert_eq!(out.cfr.len(), 1);
    }

    #[test]
    fn input_order_does_not_matter() {
        let shuffled = vec![
            run(4, RunConclusion::Success, 3, 4),
            run(1, RunConclusion::Failure, 0, 1),
            run(3, RunConclusion::Failure, 2, 3),
            run(2, RunConclusion::Failure, 1, 2),
        ];
        let out = reduce_runs(shuffled);
        assert_eq!(out.incidents.len(), 3);
        assert_eq!(
            out.incidents.iter().map(|i| i.failed_run_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn completion_time_ties_break_by_run_id() {
        let mut a = run(2, RunConclusion::Failure, 0, 2);
        let b = run(1, RunConclusion::Success, 0, 2);
        a.completed_at = b.completed_at;
        let out = reduce_runs(vec![a, b]);
        // run 1 (success) sorts before run 2 (failure) at the same instant,
        // so the failure has no later success.
        assert!(out.incidents.is_empty());
    }

    #[test]
    fn negative_duration_is_an_anomaly_not_a_sample() {
        let mut bad = run(1, RunConclusion::Success, 5, 4);
        bad.started_at = at(5);
        bad.completed_at = at(4);
        let out = reduce_runs(vec![bad, run(2, RunConclusion::Success, 4, 6)]);
        assert_eq!(out.durations.len(), 1);
        assert_eq!(out.durations[0].run_id, 2);
        assert_eq!(out.anomalies, vec![Anomaly::NegativeDuration { run_id: 1 }]);
        // The malformed run still counts toward CFR.
        assert_eq!(out.cfr.len(), 2);
    }

    #[test]
    fn duration_truncates_to_whole_seconds() {
        let mut r = run(1, RunConclusion::Success, 0, 0);
        r.started_at = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        r.completed_at = r.started_at + chrono::Duration::milliseconds(90_500);
        let out = reduce_runs(vec![r]);
        assert_eq!(out.durations[0].duration_seconds, 90);
    }

    #[test]
    fn ten_runs_three_failures_yield_ten_cfr_rows() {
        let mut runs = Vec::new();
        for i in 0..10 {
            let conclusion = if i % 3 == 0 && i < 9 {
                RunConclusion::Failure
            } else {
                RunConclusion::Success
            };
            runs.push(run(i as i64 + 1, conclusion, i, i + 1));
        }
        let out = reduce_runs(runs);
        assert_eq!(out.cfr.len(), 10);
        let failures = out.cfr.iter().filter(|s| s.conclusion.is_failure()).count();
        assert_eq!(failures, 3);
    }
}

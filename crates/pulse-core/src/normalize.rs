//! Run normalization: raw provider events into canonical [`CompletedRun`]s.
//!
//! The normalizer is a pure, total function so it can be tested against
//! literal fixtures without any provider in the loop. Adapters map their
//! wire payloads into [`RawRunEvent`] and everything past that point is
//! provider-neutral.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Anomaly;
use crate::model::{CompletedRun, RunConclusion};

/// A raw CI execution event as the adapter saw it, with every loosely-typed
/// field optional. Covers both workflow-run and check-run shapes: check-runs
/// additionally carry `head_sha` and `app_slug` for per-commit dedupe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRunEvent {
    /// Provider event id.
    pub id: i64,
    /// Lifecycle status (`completed`, `in_progress`, `queued`, ...).
    pub status: Option<String>,
    /// Terminal conclusion when the run has one.
    pub conclusion: Option<String>,
    /// Execution start time.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal-state time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Workflow or check name, kept as failure context.
    pub name: Option<String>,
    /// Commit the event ran against (check-runs only).
    pub head_sha: Option<String>,
    /// Provider application that produced the event (check-runs only).
    pub app_slug: Option<String>,
}

/// Why a raw event was not normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    /// The event has not reached a terminal state yet.
    NotCompleted,
    /// Terminal state outside the success/failure pair (e.g. cancelled).
    UnsupportedConclusion(String),
    /// Start or completion timestamp missing on a completed event.
    MissingTimestamps,
    /// An earlier completed event from the same provider application was
    /// already selected for this commit.
    DuplicateForCommit,
}

/// Result of normalizing one batch of raw events for a repository.
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    /// Canonical runs, in input order.
    pub runs: Vec<CompletedRun>,
    /// Reported defects (missing timestamps, unsupported conclusions).
    pub anomalies: Vec<Anomaly>,
    /// Events skipped because they were not terminal yet.
    pub skipped_incomplete: u64,
    /// Check-runs skipped by the first-match-per-commit rule.
    pub skipped_duplicates: u64,
}

/// Normalize a single raw event. Pure and side-effect-free; the per-commit
/// dedupe rule needs batch context and lives in [`normalize_runs`].
pub fn normalize_run(repo: &str, raw: &RawRunEvent) -> Result<CompletedRun, Discard> {
    if let Some(status) = raw.status.as_deref() {
        if status != "completed" {
            return Err(Discard::NotCompleted);
        }
    }

    let conclusion = match raw.conclusion.as_deref() {
        None => return Err(Discard::NotCompleted),
        Some(c) => match RunConclusion::parse(c) {
            Some(c) => c,
            None => return Err(Discard::UnsupportedConclusion(c.to_string())),
        },
    };

    let (started_at, completed_at) = match (raw.started_at, raw.completed_at) {
        (Some(s), Some(c)) => (s, c),
        _ => return Err(Discard::MissingTimestamps),
    };

    let label = match conclusion {
        RunConclusion::Failure => raw.name.clone(),
        RunConclusion::Success => None,
    };

    Ok(CompletedRun {
        repo: repo.to_string(),
        run_id: raw.id,
        conclusion,
        started_at,
        completed_at,
        label,
    })
}

/// Normalize a batch of raw events for one repository.
///
/// Applies the per-commit dedupe rule: among events that carry both a
/// `head_sha` and an `app_slug`, the first completed match for a commit
/// wins and later ones are ignored, not merged.
pub fn normalize_runs(repo: &str, raws: &[RawRunEvent]) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    let mut selected_commits: HashSet<(String, String)> = HashSet::new();

    for raw in raws {
        let commit_key = match (raw.head_sha.as_deref(), raw.app_slug.as_deref()) {
            (Some(sha), Some(app)) => Some((sha.to_string(), app.to_string())),
            _ => None,
        };

        match normalize_run(repo, raw) {
            Ok(run) => {
                if let Some(key) = commit_key {
                    if !selected_commits.insert(key) {
                        outcome.skipped_duplicates += 1;
                        continue;
                    }
                }
                outcome.runs.push(run);
            }
            Err(Discard::NotCompleted) => outcome.skipped_incomplete += 1,
            Err(Discard::UnsupportedConclusion(c)) => {
                outcome.anomalies.push(Anomaly::UnsupportedConclusion {
                    event_id: raw.id,
                    conclusion: c,
                });
            }
            Err(Discard::MissingTimestamps) => {
                outcome
                    .anomalies
                    .push(Anomaly::MissingTimestamps { event_id: raw.id });
            }
            Err(Discard::DuplicateForCommit) => outcome.skipped_duplicates += 1,
        }
    }

    outcome
}

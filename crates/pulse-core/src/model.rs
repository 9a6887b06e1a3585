//! Delivery-metrics domain objects.
//!
//! These types carry the four indicator pipelines end to end: completed CI
//! runs and merged change requests come in, CFR / duration / incident /
//! lead-time rows go out. Every derived row is keyed by a natural identity
//! (`repo` plus a provider id) so the sink can upsert idempotently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal conclusion of a CI run that participates in reduction.
///
/// Any other terminal state the provider reports (cancelled, skipped,
/// timed_out, ...) is excluded before reduction by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
}

impl RunConclusion {
    /// True when this conclusion marks a failed run.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure)
    }

    /// True when this conclusion marks a successful run.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Parse a provider conclusion string, returning `None` for any state
    /// outside the success/failure pair.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }

    /// Canonical lowercase name, matching the provider wire format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl std::fmt::Display for RunConclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One terminal CI execution, normalized from whatever raw shape the
/// provider produced (workflow run, check-run, ...).
///
/// Invariants (enforced by the normalizer):
/// - `repo` is non-empty and `(repo, run_id)` is a stable identity
/// - `completed_at >= started_at` is NOT guaranteed here; the reducer
///   rejects violations as anomalies rather than trusting upstream clocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRun {
    /// Owning repository, `owner/name` form.
    pub repo: String,
    /// Provider run id, unique within the repository.
    pub run_id: i64,
    /// Terminal conclusion.
    pub conclusion: RunConclusion,
    /// When execution started.
    pub started_at: DateTime<Utc>,
    /// When execution reached its terminal state.
    pub completed_at: DateTime<Utc>,
    /// Free-text failure context (workflow name on failures).
    pub label: Option<String>,
}

/// One merged unit of change (a merged pull request).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Owning repository, `owner/name` form.
    pub repo: String,
    /// Provider request number, unique within the repository.
    pub request_id: i64,
    /// Author date of the earliest commit in the request.
    pub first_change_at: DateTime<Utc>,
    /// When the request was merged.
    pub merged_at: DateTime<Utc>,
}

/// One change-failure-rate observation. Mutable on re-ingestion: the latest
/// conclusion and completion time for `(repo, run_id)` win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfrSample {
    pub repo: String,
    pub run_id: i64,
    pub conclusion: RunConclusion,
    pub completed_at: DateTime<Utc>,
    /// Failure context carried through for dashboards.
    pub failure_reason: Option<String>,
}

/// One build-duration observation, keyed like [`CfrSample`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationSample {
    pub repo: String,
    pub run_id: i64,
    /// Whole seconds from start to completion, never negative.
    pub duration_seconds: i64,
    pub completed_at: DateTime<Utc>,
}

/// A derived failure -> recovery pairing, one MTTR observation.
///
/// `(repo, failed_run_id)` is write-once: the first resolution recorded for
/// a failure is never overwritten by a later pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub repo: String,
    pub failed_run_id: i64,
    pub resolved_run_id: i64,
    pub failure_time: DateTime<Utc>,
    pub resolution_time: DateTime<Utc>,
    /// Whole seconds from failure to the next success, >= 0.
    pub recovery_seconds: i64,
}

/// One lead-time-for-change observation, keyed by `(repo, request_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadTimeSample {
    pub repo: String,
    pub request_id: i64,
    pub first_change_at: DateTime<Utc>,
    pub merged_at: DateTime<Utc>,
    /// Whole seconds from first change to merge, >= 0.
    pub lead_seconds: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conclusion_parse_accepts_only_terminal_pair() {
        assert_eq!(RunConclusion::parse("success"), Some(RunConclusion::Success));
        assert_eq!(RunConclusion::parse("failure"), Some(RunConclusion::Failure));
        assert_eq!(RunConclusion::parse("cancelled"), None);
        assert_eq!(RunConclusion::parse("skipped"), None);
        assert_eq!(RunConclusion::parse(""), None);
    }

    #[test]
    fn conclusion_serializes_snake_case() {
        let json = serde_json::to_string(&RunConclusion::Failure).unwrap();
        assert_eq!(json, "\"failure\"");
    }
}

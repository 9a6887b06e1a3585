//! Error taxonomy and anomaly accounting for the reduction engine.

use thiserror::Error;

/// Errors surfaced by an event source for one repository.
///
/// The orchestrator isolates these per repository: neither variant may
/// abort sibling repositories.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transient provider fault (network error, 5xx, rate-limit exhaustion).
    /// The repository is skipped this cycle and retried on the next
    /// scheduled invocation.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Permanent provider rejection (404, bad credentials). The repository
    /// is flagged for operator attention.
    #[error("source rejected: {0}")]
    Rejected(String),
}

impl SourceError {
    /// True for the transient variant.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A single-event defect found during normalization or reduction.
///
/// Anomalies are counted and logged, never fatal: the offending event is
/// dropped and processing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// `completed_at < started_at` on a run; no duration sample is emitted.
    NegativeDuration { run_id: i64 },
    /// `merged_at < first_change_at` on a change request; discarded.
    NegativeLeadTime { request_id: i64 },
    /// A raw event was missing its start or completion timestamp.
    MissingTimestamps { event_id: i64 },
    /// A raw event carried a terminal state outside success/failure.
    UnsupportedConclusion { event_id: i64, conclusion: String },
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeDuration { run_id } => {
                write!(f, "negative duration on run {run_id}")
            }
            Self::NegativeLeadTime { request_id } => {
                write!(f, "negative lead time on change request {request_id}")
            }
            Self::MissingTimestamps { event_id } => {
                write!(f, "missing timestamps on event {event_id}")
            }
            Self::UnsupportedConclusion {
                event_id,
                conclusion,
            } => {
                write!(f, "unsupported conclusion '{conclusion}' on event {event_id}")
            }
        }
    }
}

/// Per-repository anomaly rollup for outcome reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct AnomalyCounts {
    pub negative_durations: u64,
    pub negative_lead_times: u64,
    pub missing_timestamps: u64,
    pub unsupported_conclusions: u64,
}

impl AnomalyCounts {
    /// Record one anomaly into the rollup.
    pub fn record(&mut self, anomaly: &Anomaly) {
        match anomaly {
            Anomaly::NegativeDuration { .. } => self.negative_durations += 1,
            Anomaly::NegativeLeadTime { .. } => self.negative_lead_times += 1,
            Anomaly::MissingTimestamps { .. } => self.missing_timestamps += 1,
            Anomaly::UnsupportedConclusion { .. } => self.unsupported_conclusions += 1,
        }
    }

    /// Fold a batch of anomalies into the rollup.
    pub fn record_all<'a>(&mut self, anomalies: impl IntoIterator<Item = &'a Anomaly>) {
        for a in anomalies {
            self.record(a);
        }
    }

    /// Total anomalies seen.
    pub fn total(&self) -> u64 {
        self.negative_durations
            + self.negative_lead_times
            + self.missing_timestamps
            + self.unsupported_conclusions
    }
}

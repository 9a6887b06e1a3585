//! Bounded-concurrency fan-out over repositories.
//!
//! A fixed-size pool of in-flight repositories, each running the strictly
//! sequential [`RepoPipeline`]. One repository's failure never cancels its
//! siblings; the report collects every outcome.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::info;

use pulse_core::{EventSource, IngestConfig};
use pulse_state::MetricsStore;

use crate::pipeline::{RepoOutcome, RepoPipeline, RepoStatus};

/// Aggregated result of one ingestion pass across all repositories.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Per-repository outcomes, sorted by repository name.
    pub outcomes: Vec<RepoOutcome>,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    /// Rows handed to the sink across all tables and repositories.
    pub rows_written: usize,
    /// Anomalies seen across all repositories.
    pub anomalies: u64,
}

impl IngestReport {
    fn from_outcomes(mut outcomes: Vec<RepoOutcome>) -> Self {
        outcomes.sort_by(|a, b| a.repo.cmp(&b.repo));
        let succeeded = outcomes
            .iter()
            .filter(|o| o.status == RepoStatus::Succeeded)
            .count();
        let partial = outcomes
            .iter()
            .filter(|o| o.status == RepoStatus::Partial)
            .count();
        let failed = outcomes
            .iter()
            .filter(|o| o.status == RepoStatus::Failed)
            .count();
        let rows_written = outcomes
            .iter()
            .map(|o| o.cfr_rows + o.duration_rows + o.incident_rows + o.lead_time_rows)
            .sum();
        let anomalies = outcomes.iter().map(|o| o.anomalies.total()).sum();
        Self {
            outcomes,
            succeeded,
            partial,
            failed,
            rows_written,
            anomalies,
        }
    }

    /// True when no repository produced any metrics.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.failed == self.outcomes.len()
    }
}

/// Drives one pipeline instance per configured repository.
pub struct Orchestrator {
    config: IngestConfig,
}

impl Orchestrator {
    /// Build an orchestrator for one explicit configuration value.
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Run the ingestion pass. Repositories execute with at most
    /// `config.concurrency` in flight; results for different repositories
    /// may be written in any interleaving.
    pub async fn run(
        &self,
        source: Arc<dyn EventSource>,
        store: Arc<dyn MetricsStore>,
    ) -> IngestReport {
        info!(
            repositories = self.config.repositories.len(),
            concurrency = self.config.concurrency,
            "starting ingestion pass"
        );

        let outcomes = stream::iter(self.config.repositories.clone())
            .map(|repo| {
                let source = Arc::clone(&source);
                let store = Arc::clone(&store);
                let config = self.config.clone();
                async move {
                    RepoPipeline::run(source.as_ref(), store.as_ref(), &repo, &config).await
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let report = IngestReport::from_outcomes(outcomes);
        info!(
            succeeded = report.succeeded,
            partial = report.partial,
            failed = report.failed,
            rows = report.rows_written,
            anomalies = report.anomalies,
            "ingestion pass finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::AnomalyCounts;

    fn outcome(repo: &str, status: RepoStatus) -> RepoOutcome {
        RepoOutcome {
            repo: repo.to_string(),
            status,
            cfr_rows: 2,
            duration_rows: 2,
            incident_rows: 1,
            lead_time_rows: 0,
            anomalies: AnomalyCounts::default(),
            reason: None,
        }
    }

    #[test]
    fn report_tallies_outcomes_and_sorts() {
        let report = IngestReport::from_outcomes(vec![
            outcome("z/last", RepoStatus::Failed),
            outcome("a/first", RepoStatus::Succeeded),
            outcome("m/mid", RepoStatus::Partial),
        ]);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.partial, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.rows_written, 15);
        assert_eq!(report.outcomes[0].repo, "a/first");
        assert!(!report.all_failed());
    }

    #[test]
    fn all_failed_requires_every_repo_failing() {
        let report = IngestReport::from_outcomes(vec![
            outcome("a/a", RepoStatus::Failed),
            outcome("b/b", RepoStatus::Failed),
        ]);
        assert!(report.all_failed());

        let empty = IngestReport::from_outcomes(Vec::new());
        assert!(!empty.all_failed());
    }
}

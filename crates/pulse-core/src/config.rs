//! Ingestion configuration.
//!
//! One explicit configuration value is handed to the orchestrator at
//! construction; there is no process-wide mutable state.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Time window an ingestion pass covers. Open bounds mean "as far as the
/// provider returns".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Rate-limit back-off policy applied uniformly by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// How many rate-limit waits to tolerate per request before giving up
    /// with `SourceUnavailable`.
    pub max_rate_limit_waits: u32,
    /// Upper bound on a single back-off sleep.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_waits: 2,
            max_wait: Duration::from_secs(120),
        }
    }
}

/// Which provider surface supplies run events for a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunSource {
    /// Workflow-run listings for a branch.
    #[default]
    WorkflowRuns,
    /// Check-runs on merged change-request head commits. Events carry
    /// commit context, so the normalizer keeps the first completed
    /// event per commit.
    CheckRuns,
}

/// Full configuration for one ingestion pass.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Repositories to process, `owner/name` form.
    pub repositories: Vec<String>,
    /// Window applied to run and change listings.
    pub window: TimeWindow,
    /// Restrict runs to this branch; `None` means the repository's
    /// default branch.
    pub branch: Option<String>,
    /// Which listing surface run events come from.
    pub run_source: RunSource,
    /// Maximum repositories in flight at once.
    pub concurrency: usize,
    /// Rate-limit back-off applied by the event source.
    pub retry: RetryPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            window: TimeWindow::default(),
            branch: None,
            run_source: RunSource::default(),
            concurrency: 5,
            retry: RetryPolicy::default(),
        }
    }
}

impl IngestConfig {
    /// Configuration for the given repositories with default settings.
    pub fn new(repositories: Vec<String>) -> Self {
        Self {
            repositories,
            ..Default::default()
        }
    }

    /// Set the ingestion window.
    pub fn with_window(mut self, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.window = TimeWindow { since, until };
        self
    }

    /// Restrict runs to one branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Pick the listing surface run events come from.
    pub fn with_run_source(mut self, run_source: RunSource) -> Self {
        self.run_source = run_source;
        self
    }

    /// Set the worker-pool size. Clamped to at least 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the rate-limit back-off policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_worker_pool_of_five() {
        let config = IngestConfig::default();
        assert_eq!(config.concurrency, 5);
        assert!(config.repositories.is_empty());
        assert_eq!(config.run_source, RunSource::WorkflowRuns);
    }

    #[test]
    fn concurrency_clamps_to_one() {
        let config = IngestConfig::new(vec!["o/r".to_string()]).with_concurrency(0);
        assert_eq!(config.concurrency, 1);
    }
}

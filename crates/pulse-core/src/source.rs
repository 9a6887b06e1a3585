//! Event source abstraction.
//!
//! An [`EventSource`] hides the provider's pagination and transient-error
//! handling behind two listing calls. Implementations must scope failures
//! to the repository being fetched; a fault for one repository never
//! aborts siblings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::model::ChangeRequest;
use crate::normalize::RawRunEvent;

/// Result type for event source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Filters applied when listing runs for a repository.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    /// Restrict to runs on this branch.
    pub branch: Option<String>,
    /// Only runs created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only runs created at or before this instant.
    pub until: Option<DateTime<Utc>>,
}

impl RunFilter {
    /// Filter to a single branch.
    pub fn branch(branch: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            ..Default::default()
        }
    }

    /// Restrict to a time window.
    pub fn with_window(mut self, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self.until = until;
        self
    }
}

/// Read-only, paginated event source for one provider.
///
/// Guarantees:
/// - Listing calls follow pagination to exhaustion (or a configured page
///   cap) before returning.
/// - Transient faults surface as [`SourceError::Unavailable`], permanent
///   rejections as [`SourceError::Rejected`]; neither is retried here
///   beyond provider-documented rate-limit back-off.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// List raw run events for a repository under the given filter.
    async fn list_runs(&self, repo: &str, filter: &RunFilter) -> SourceResult<Vec<RawRunEvent>>;

    /// List raw check-run events for the head commits of change requests
    /// merged inside the filter window. Events carry `head_sha` and
    /// `app_slug` so the normalizer can keep the first completed event
    /// per commit.
    async fn list_check_runs(
        &self,
        repo: &str,
        filter: &RunFilter,
    ) -> SourceResult<Vec<RawRunEvent>>;

    /// List merged change requests with their earliest-change timestamp.
    async fn list_merged_changes(
        &self,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<ChangeRequest>>;
}

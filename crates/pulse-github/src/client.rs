//! GitHub REST client implementing the [`EventSource`] seam.
//!
//! Hides pagination and rate-limit back-off from the pipeline. Failures
//! are scoped to the repository being fetched and classified as transient
//! (`SourceError::Unavailable`) or permanent (`SourceError::Rejected`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use pulse_core::{
    ChangeRequest, EventSource, RawRunEvent, RetryPolicy, RunFilter, SourceError, SourceResult,
};

use crate::wire::{
    WireCheckRunsPage, WirePull, WirePullCommit, WireRepo, WireRunsPage,
};

/// Application slug the provider uses for its own CI runs; check-run
/// ingestion filters to this producer.
pub const GITHUB_ACTIONS_APP: &str = "github-actions";

/// GitHub client configuration
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// Personal access token; unauthenticated requests work but rate-limit
    /// quickly.
    pub token: Option<String>,
    /// API base URL (override for GitHub Enterprise).
    pub api_base: String,
    /// Page size for listing endpoints.
    pub per_page: u8,
    /// Maximum pages followed per listing call.
    pub page_cap: usize,
    /// Rate-limit back-off policy.
    pub retry: RetryPolicy,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            token: std::env::var("GITHUB_TOKEN").ok(),
            api_base: std::env::var("GITHUB_API_BASE")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            per_page: 100,
            page_cap: 10,
            retry: RetryPolicy::default(),
        }
    }
}

impl GithubConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Set the access token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the page cap
    pub fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = cap.max(1);
        self
    }

    /// Set the rate-limit back-off policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// GitHub API client for run and change-request listing
pub struct GithubClient {
    config: GithubConfig,
    http: reqwest::Client,
}

impl GithubClient {
    /// Create a new GitHub client
    pub fn new(config: GithubConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("deploypulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        GithubClient { config, http }
    }

    /// Create client from environment variables
    pub fn from_env() -> Self {
        Self::new(GithubConfig::from_env())
    }

    /// Default branch for a repository, assuming `main` when the lookup
    /// fails (listing against `main` still succeeds for most repos).
    pub async fn default_branch(&self, repo: &str) -> String {
        match self.get_json::<WireRepo>(&format!("/repos/{repo}"), &[]).await {
            Ok(r) => r.default_branch.unwrap_or_else(|| "main".to_string()),
            Err(e) => {
                warn!(repo = %repo, error = %e, "could not fetch default branch, assuming 'main'");
                "main".to_string()
            }
        }
    }

    /// Completed check-runs for one commit, filtered to the provider's own
    /// CI application. Later duplicates for the commit are left for the
    /// normalizer's first-match rule.
    pub async fn check_runs_for_commit(
        &self,
        repo: &str,
        sha: &str,
    ) -> SourceResult<Vec<RawRunEvent>> {
        let page: WireCheckRunsPage = self
            .get_json(
                &format!("/repos/{repo}/commits/{sha}/check-runs"),
                &[("per_page", self.config.per_page.to_string())],
            )
            .await?;
        Ok(actions_check_runs(&page))
    }

    // -- private helpers -----------------------------------------------------

    /// Closed pull requests against the default branch that were merged
    /// inside `[since, until]`, paginated up to the page cap.
    async fn merged_pulls(
        &self,
        repo: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<WirePull>> {
        let branch = self.default_branch(repo).await;
        let mut merged = Vec::new();

        for page in 1..=self.config.page_cap {
            let query = vec![
                ("per_page", self.config.per_page.to_string()),
                ("page", page.to_string()),
                ("state", "closed".to_string()),
                ("base", branch.clone()),
                ("sort", "updated".to_string()),
                ("direction", "desc".to_string()),
            ];
            let pulls: Vec<WirePull> = self
                .get_json(&format!("/repos/{repo}/pulls"), &query)
                .await?;
            if pulls.is_empty() {
                break;
            }

            merged.extend(pulls.into_iter().filter(|pull| match pull.merged_at {
                Some(at) => {
                    since.map_or(true, |s| at >= s) && until.map_or(true, |u| at <= u)
                }
                None => false,
            }));
        }

        Ok(merged)
    }

    /// Earliest commit author date for one pull request.
    async fn first_commit_date(
        &self,
        repo: &str,
        number: i64,
    ) -> SourceResult<Option<DateTime<Utc>>> {
        let commits: Vec<WirePullCommit> = self
            .get_json(
                &format!("/repos/{repo}/pulls/{number}/commits"),
                &[("per_page", self.config.per_page.to_string())],
            )
            .await?;
        Ok(commits.first().and_then(WirePullCommit::author_date))
    }

    /// One GET with auth headers, rate-limit back-off, and status
    /// classification.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> SourceResult<T> {
        let url = format!("{}{}", self.config.api_base, path);
        let mut waits = 0u32;

        loop {
            let mut request = self
                .http
                .get(&url)
                .query(query)
                .header(ACCEPT, "application/vnd.github.v3+json");
            if let Some(token) = &self.config.token {
                request = request.header(AUTHORIZATION, format!("token {token}"));
            }

            let response = request
                .send()
                .await
                .map_err(|e| SourceError::Unavailable(format!("request failed: {e}")))?;
            let status = response.status();

            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(|e| SourceError::Unavailable(format!("malformed response: {e}")));
            }

            if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = header_u64(&response, "retry-after");
                let remaining = header_u64(&response, "x-ratelimit-remaining");
                let reset = header_u64(&response, "x-ratelimit-reset");

                if retry_after.is_some() || remaining == Some(0) {
                    if waits >= self.config.retry.max_rate_limit_waits {
                        return Err(SourceError::Unavailable(format!(
                            "rate limit persisted after {waits} waits for {url}"
                        )));
                    }
                    let delay = rate_limit_delay(
                        retry_after,
                        reset,
                        Utc::now().timestamp(),
                        self.config.retry.max_wait,
                    );
                    warn!(url = %url, delay_secs = delay.as_secs(), "rate limited, backing off");
                    tokio::time::sleep(delay).await;
                    waits += 1;
                    continue;
                }
                return Err(SourceError::Rejected(format!("{status} for {url}")));
            }

            if matches!(
                status,
                StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND | StatusCode::GONE
            ) {
                return Err(SourceError::Rejected(format!("{status} for {url}")));
            }

            return Err(SourceError::Unavailable(format!("{status} for {url}")));
        }
    }
}

#[async_trait]
impl EventSource for GithubClient {
    async fn list_runs(&self, repo: &str, filter: &RunFilter) -> SourceResult<Vec<RawRunEvent>> {
        let branch = match &filter.branch {
            Some(b) => b.clone(),
            None => self.default_branch(repo).await,
        };

        let mut events = Vec::new();
        for page in 1..=self.config.page_cap {
            let mut query = vec![
                ("per_page", self.config.per_page.to_string()),
                ("page", page.to_string()),
                ("branch", branch.clone()),
            ];
            if let Some(created) = created_range(filter.since, filter.until) {
                query.push(("created", created));
            }

            let runs: WireRunsPage = self
                .get_json(&format!("/repos/{repo}/actions/runs"), &query)
                .await?;
            if runs.workflow_runs.is_empty() {
                break;
            }
            events.extend(runs.workflow_runs.iter().map(RawRunEvent::from));
        }

        debug!(repo = %repo, branch = %branch, runs = events.len(), "fetched workflow runs");
        Ok(events)
    }

    async fn list_check_runs(
        &self,
        repo: &str,
        filter: &RunFilter,
    ) -> SourceResult<Vec<RawRunEvent>> {
        let pulls = self.merged_pulls(repo, filter.since, filter.until).await?;

        let mut events = Vec::new();
        for pull in &pulls {
            let Some(sha) = pull.head.as_ref().and_then(|h| h.sha.as_deref()) else {
                warn!(repo = %repo, pull = pull.number, "merged request has no head commit, skipping");
                continue;
            };
            // One commit's check-run listing failing is not fatal for the
            // repository; skip it with a warning.
            match self.check_runs_for_commit(repo, sha).await {
                Ok(runs) => events.extend(runs),
                Err(e) => {
                    warn!(repo = %repo, pull = pull.number, sha = %sha, error = %e, "could not list check-runs, skipping commit");
                }
            }
        }

        debug!(repo = %repo, events = events.len(), "fetched check-run events");
        Ok(events)
    }

    async fn list_merged_changes(
        &self,
        repo: &str,
        since: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<ChangeRequest>> {
        let pulls = self.merged_pulls(repo, since, None).await?;
        let mut requests = Vec::new();

        for pull in &pulls {
            let Some(merged_at) = pull.merged_at else {
                continue;
            };

            // One PR's commit listing failing is not fatal for the
            // repository; skip it with a warning.
            match self.first_commit_date(repo, pull.number).await {
                Ok(Some(first_change_at)) => requests.push(ChangeRequest {
                    repo: repo.to_string(),
                    request_id: pull.number,
                    first_change_at,
                    merged_at,
                }),
                Ok(None) => {
                    warn!(repo = %repo, pull = pull.number, "merged request has no dated commits, skipping");
                }
                Err(e) => {
                    warn!(repo = %repo, pull = pull.number, error = %e, "could not list commits, skipping request");
                }
            }
        }

        debug!(repo = %repo, requests = requests.len(), "fetched merged change requests");
        Ok(requests)
    }
}

/// Keep only check-runs produced by the provider's own CI application,
/// mapped to raw events for the normalizer.
fn actions_check_runs(page: &WireCheckRunsPage) -> Vec<RawRunEvent> {
    page.check_runs
        .iter()
        .filter(|run| run.app_slug() == Some(GITHUB_ACTIONS_APP))
        .map(RawRunEvent::from)
        .collect()
}

/// Provider `created` filter for a half-open or closed window.
fn created_range(since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Option<String> {
    match (since, until) {
        (Some(s), Some(u)) => Some(format!("{}..{}", s.to_rfc3339(), u.to_rfc3339())),
        (Some(s), None) => Some(format!(">={}", s.to_rfc3339())),
        (None, Some(u)) => Some(format!("<={}", u.to_rfc3339())),
        (None, None) => None,
    }
}

/// Delay before retrying a rate-limited request: `retry-after` wins,
/// otherwise sleep until the advertised reset, capped by policy.
fn rate_limit_delay(
    retry_after: Option<u64>,
    reset_epoch: Option<u64>,
    now_epoch: i64,
    max_wait: Duration,
) -> Duration {
    let secs = if let Some(after) = retry_after {
        after
    } else if let Some(reset) = reset_epoch {
        reset.saturating_sub(now_epoch.max(0) as u64).max(1)
    } else {
        60
    };
    Duration::from_secs(secs).min(max_wait)
}

fn header_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    response.headers().get(name)?.to_str().ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn created_range_forms() {
        let s = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let u = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(
            created_range(Some(s), Some(u)).unwrap(),
            format!("{}..{}", s.to_rfc3339(), u.to_rfc3339())
        );
        assert!(created_range(Some(s), None).unwrap().starts_with(">="));
        assert!(created_range(None, Some(u)).unwrap().starts_with("<="));
        assert_eq!(created_range(None, None), None);
    }

    #[test]
    fn check_run_filter_keeps_only_provider_ci_apps() {
        let page: WireCheckRunsPage = serde_json::from_str(
            r#"{
                "check_runs": [
                    {"id": 1, "status": "completed", "conclusion": "success",
                     "head_sha": "abc", "app": {"slug": "github-actions"}},
                    {"id": 2, "status": "completed", "conclusion": "failure",
                     "head_sha": "abc", "app": {"slug": "sonarqube"}},
                    {"id": 3, "status": "completed", "conclusion": "failure",
                     "head_sha": "abc"}
                ]
            }"#,
        )
        .unwrap();

        let events = actions_check_runs(&page);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, 1);
        assert_eq!(events[0].app_slug.as_deref(), Some(GITHUB_ACTIONS_APP));
    }

    #[test]
    fn retry_after_header_wins() {
        let delay = rate_limit_delay(Some(30), Some(9_999_999_999), 0, Duration::from_secs(120));
        assert_eq!(delay, Duration::from_secs(30));
    }

    #[test]
    fn reset_epoch_is_relative_to_now() {
        let delay = rate_limit_delay(None, Some(1_000_060), 1_000_000, Duration::from_secs(120));
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn delay_is_capped_by_policy() {
        let delay = rate_limit_delay(Some(600), None, 0, Duration::from_secs(120));
        assert_eq!(delay, Duration::from_secs(120));
    }

    #[test]
    fn past_reset_still_waits_a_beat() {
        let delay = rate_limit_delay(None, Some(10), 1_000_000, Duration::from_secs(120));
        assert_eq!(delay, Duration::from_secs(1));
    }
}

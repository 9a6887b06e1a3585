//! GitHub REST v3 wire payloads.
//!
//! Every loosely-typed field is optional so a partially-filled payload
//! deserializes instead of failing the whole page; the normalizer decides
//! what to discard.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use pulse_core::RawRunEvent;

/// `GET /repos/{repo}` — only the default branch is read.
#[derive(Debug, Deserialize)]
pub struct WireRepo {
    pub default_branch: Option<String>,
}

/// `GET /repos/{repo}/actions/runs` page envelope.
#[derive(Debug, Default, Deserialize)]
pub struct WireRunsPage {
    #[serde(default)]
    pub workflow_runs: Vec<WireWorkflowRun>,
}

/// One workflow run. `created_at`/`updated_at` stand in for start and
/// completion times, matching how the provider reports terminal runs.
#[derive(Debug, Clone, Deserialize)]
pub struct WireWorkflowRun {
    pub id: i64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub head_sha: Option<String>,
}

impl From<&WireWorkflowRun> for RawRunEvent {
    fn from(run: &WireWorkflowRun) -> Self {
        RawRunEvent {
            id: run.id,
            status: run.status.clone(),
            conclusion: run.conclusion.clone(),
            started_at: run.created_at,
            completed_at: run.updated_at,
            name: run.name.clone(),
            head_sha: run.head_sha.clone(),
            app_slug: None,
        }
    }
}

/// `GET /repos/{repo}/pulls` entry (closed PRs; merged ones carry
/// `merged_at`).
#[derive(Debug, Clone, Deserialize)]
pub struct WirePull {
    pub number: i64,
    pub merged_at: Option<DateTime<Utc>>,
    pub head: Option<WirePullHead>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePullHead {
    pub sha: Option<String>,
}

/// `GET /repos/{repo}/pulls/{n}/commits` entry.
#[derive(Debug, Deserialize)]
pub struct WirePullCommit {
    pub commit: Option<WireCommitDetail>,
}

#[derive(Debug, Deserialize)]
pub struct WireCommitDetail {
    pub author: Option<WireCommitAuthor>,
}

#[derive(Debug, Deserialize)]
pub struct WireCommitAuthor {
    pub date: Option<DateTime<Utc>>,
}

impl WirePullCommit {
    /// Author date, when the payload carries one.
    pub fn author_date(&self) -> Option<DateTime<Utc>> {
        self.commit.as_ref()?.author.as_ref()?.date
    }
}

/// `GET /repos/{repo}/commits/{sha}/check-runs` page envelope.
#[derive(Debug, Default, Deserialize)]
pub struct WireCheckRunsPage {
    #[serde(default)]
    pub check_runs: Vec<WireCheckRun>,
}

/// One check-run; carries the producing application for per-commit dedupe.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCheckRun {
    pub id: i64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub head_sha: Option<String>,
    pub app: Option<WireApp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireApp {
    pub slug: Option<String>,
}

impl WireCheckRun {
    /// Slug of the application that produced this check-run.
    pub fn app_slug(&self) -> Option<&str> {
        self.app.as_ref()?.slug.as_deref()
    }
}

impl From<&WireCheckRun> for RawRunEvent {
    fn from(run: &WireCheckRun) -> Self {
        RawRunEvent {
            id: run.id,
            status: run.status.clone(),
            conclusion: run.conclusion.clone(),
            started_at: run.started_at,
            completed_at: run.completed_at,
            name: run.name.clone(),
            head_sha: run.head_sha.clone(),
            app_slug: run.app.as_ref().and_then(|a| a.slug.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_run_maps_created_updated_to_start_complete() {
        let json = r#"{
            "id": 101,
            "name": "CI",
            "status": "completed",
            "conclusion": "failure",
            "created_at": "2024-01-01T10:00:00Z",
            "updated_at": "2024-01-01T10:20:00Z",
            "head_sha": "abc123"
        }"#;
        let run: WireWorkflowRun = serde_json::from_str(json).unwrap();
        let raw = RawRunEvent::from(&run);
        assert_eq!(raw.id, 101);
        assert_eq!(raw.conclusion.as_deref(), Some("failure"));
        assert!(raw.started_at.unwrap() < raw.completed_at.unwrap());
        assert_eq!(raw.app_slug, None);
    }

    #[test]
    fn check_run_carries_app_slug() {
        let json = r#"{
            "id": 7,
            "name": "build",
            "status": "completed",
            "conclusion": "success",
            "started_at": "2024-01-01T10:00:00Z",
            "completed_at": "2024-01-01T10:05:00Z",
            "head_sha": "abc123",
            "app": {"slug": "github-actions"}
        }"#;
        let run: WireCheckRun = serde_json::from_str(json).unwrap();
        assert_eq!(run.app_slug(), Some("github-actions"));
        let raw = RawRunEvent::from(&run);
        assert_eq!(raw.app_slug.as_deref(), Some("github-actions"));
        assert_eq!(raw.head_sha.as_deref(), Some("abc123"));
    }

    #[test]
    fn sparse_payloads_still_deserialize() {
        let run: WireWorkflowRun = serde_json::from_str(r#"{"id": 5}"#).unwrap();
        assert_eq!(run.id, 5);
        assert!(run.conclusion.is_none());

        let page: WireRunsPage = serde_json::from_str("{}").unwrap();
        assert!(page.workflow_runs.is_empty());
    }

    #[test]
    fn pull_commit_author_date_tolerates_missing_levels() {
        let commit: WirePullCommit = serde_json::from_str(r#"{"commit": {}}"#).unwrap();
        assert!(commit.author_date().is_none());

        let commit: WirePullCommit = serde_json::from_str(
            r#"{"commit": {"author": {"date": "2024-01-01T00:00:00Z"}}}"#,
        )
        .unwrap();
        assert!(commit.author_date().is_some());
    }
}

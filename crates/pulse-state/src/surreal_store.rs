//! SurrealDB-backed MetricsStore implementation
//!
//! Uses the `schema` row types for persistence, converting to/from the
//! domain types at the boundary. Record ids are derived from each row's
//! natural key, so the conflict behavior lives in the insert statement:
//! `ON DUPLICATE KEY UPDATE` for the mutable tables, `INSERT IGNORE` for
//! the write-once incidents table.

use async_trait::async_trait;
use serde_json::Value;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use pulse_core::{CfrSample, DurationSample, Incident, LeadTimeSample};

use crate::error::{StateError, StoreError};
use crate::migrations;
use crate::schema::{CfrRow, DurationRow, IncidentRow, LeadTimeRow};
use crate::storage_traits::{MetricsStore, StoreResult};

/// SurrealDB-backed implementation of [`MetricsStore`].
pub struct SurrealMetricsStore {
    db: Surreal<Any>,
}

impl SurrealMetricsStore {
    /// Connect to any engine URL, select `deploypulse/metrics`, and run
    /// `init_schema`.
    pub async fn open(url: &str) -> Result<Self, StateError> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns("deploypulse")
            .use_db("metrics")
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;

        info!("SurrealMetricsStore connected ({})", url);
        Ok(Self { db })
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> Result<Self, StateError> {
        Self::open("mem://").await
    }

    /// Create from environment variables.
    ///
    /// Uses `SURREALDB_URL` when set; otherwise falls back to local
    /// persistence under `.deploypulse/db`.
    pub async fn from_env() -> Result<Self, StateError> {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return Self::open(&url).await;
        }

        let path = ".deploypulse/db";
        std::fs::create_dir_all(path).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                path, e
            ))
        })?;
        let url = format!("surrealkv://{}", path);
        info!(
            "No SURREALDB_URL found, using local persistence: {}",
            url
        );
        Self::open(&url).await
    }

    // -- private helpers -----------------------------------------------------

    /// Serialize a row and inject its natural-key record id.
    fn row_with_id<R: serde::Serialize>(row: &R, id: String) -> StoreResult<Value> {
        let mut value = serde_json::to_value(row)?;
        let obj = value.as_object_mut().ok_or_else(|| {
            StoreError::Serialization("row did not serialize to an object".to_string())
        })?;
        obj.insert("id".to_string(), Value::String(id));
        Ok(value)
    }

    /// Apply one batch as a single transactional statement. `statement`
    /// must consume a `$rows` array bind.
    async fn apply_batch(&self, statement: &str, rows: Vec<Value>) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let count = rows.len();
        let sql = format!(
            "BEGIN TRANSACTION; {} COMMIT TRANSACTION;",
            statement
        );
        let response = self.db.query(sql).bind(("rows", rows)).await?;
        // Surface per-statement errors (the SDK reports them lazily).
        response.check()?;
        Ok(count)
    }

    // -- read-back queries ---------------------------------------------------

    /// All CFR rows for a repository, ordered by run id.
    pub async fn cfr_for_repo(&self, repo: &str) -> StoreResult<Vec<CfrSample>> {
        let mut res = self
            .db
            .query("SELECT * FROM cfr_runs WHERE repo = $repo ORDER BY run_id")
            .bind(("repo", repo.to_string()))
            .await?;
        let rows: Vec<CfrRow> = res.take(0)?;
        rows.into_iter().map(CfrSample::try_from).collect()
    }

    /// All duration rows for a repository, ordered by run id.
    pub async fn durations_for_repo(&self, repo: &str) -> StoreResult<Vec<DurationSample>> {
        let mut res = self
            .db
            .query("SELECT * FROM build_durations WHERE repo = $repo ORDER BY run_id")
            .bind(("repo", repo.to_string()))
            .await?;
        let rows: Vec<DurationRow> = res.take(0)?;
        rows.into_iter().map(DurationSample::try_from).collect()
    }

    /// All incident rows for a repository, ordered by failed run id.
    pub async fn incidents_for_repo(&self, repo: &str) -> StoreResult<Vec<Incident>> {
        let mut res = self
            .db
            .query("SELECT * FROM incidents WHERE repo = $repo ORDER BY failed_run_id")
            .bind(("repo", repo.to_string()))
            .await?;
        let rows: Vec<IncidentRow> = res.take(0)?;
        rows.into_iter().map(Incident::try_from).collect()
    }

    /// All lead-time rows for a repository, ordered by request id.
    pub async fn lead_times_for_repo(&self, repo: &str) -> StoreResult<Vec<LeadTimeSample>> {
        let mut res = self
            .db
            .query("SELECT * FROM lead_times WHERE repo = $repo ORDER BY request_id")
            .bind(("repo", repo.to_string()))
            .await?;
        let rows: Vec<LeadTimeRow> = res.take(0)?;
        rows.into_iter().map(LeadTimeSample::try_from).collect()
    }
}

#[async_trait]
impl MetricsStore for SurrealMetricsStore {
    async fn upsert_cfr(&self, batch: &[CfrSample]) -> StoreResult<usize> {
        let rows = batch
            .iter()
            .map(|s| {
                Self::row_with_id(&CfrRow::from(s), format!("{}:{}", s.repo, s.run_id))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        debug!(rows = rows.len(), "upserting cfr batch");
        self.apply_batch(
            "INSERT INTO cfr_runs $rows ON DUPLICATE KEY UPDATE \
                conclusion = $input.conclusion, \
                completed_at = $input.completed_at, \
                failure_reason = $input.failure_reason;",
            rows,
        )
        .await
    }

    async fn upsert_durations(&self, batch: &[DurationSample]) -> StoreResult<usize> {
        let rows = batch
            .iter()
            .map(|s| {
                Self::row_with_id(&DurationRow::from(s), format!("{}:{}", s.repo, s.run_id))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        debug!(rows = rows.len(), "upserting duration batch");
        self.apply_batch(
            "INSERT INTO build_durations $rows ON DUPLICATE KEY UPDATE \
                duration_seconds = $input.duration_seconds, \
                completed_at = $input.completed_at;",
            rows,
        )
        .await
    }

    async fn upsert_incidents(&self, batch: &[Incident]) -> StoreResult<usize> {
        let rows = batch
            .iter()
            .map(|s| {
                Self::row_with_id(
                    &IncidentRow::from(s),
                    format!("{}:{}", s.repo, s.failed_run_id),
                )
            })
            .collect::<StoreResult<Vec<_>>>()?;
        debug!(rows = rows.len(), "inserting incident batch");
        // Write-once: existing (repo, failed_run_id) rows are left untouched.
        self.apply_batch("INSERT IGNORE INTO incidents $rows;", rows).await
    }

    async fn upsert_lead_times(&self, batch: &[LeadTimeSample]) -> StoreResult<usize> {
        let rows = batch
            .iter()
            .map(|s| {
                Self::row_with_id(&LeadTimeRow::from(s), format!("{}:{}", s.repo, s.request_id))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        debug!(rows = rows.len(), "upserting lead-time batch");
        self.apply_batch(
            "INSERT INTO lead_times $rows ON DUPLICATE KEY UPDATE \
                first_change_at = $input.first_change_at, \
                merged_at = $input.merged_at, \
                lead_seconds = $input.lead_seconds;",
            rows,
        )
        .await
    }
}

//! Per-repository ingestion pipeline.
//!
//! One strictly sequential pass: fetch -> normalize -> reduce -> sink. The
//! reducers need the complete run set before pairing incidents, so there is
//! no intra-repository parallelism. Failures never escape as errors; they
//! are folded into the repository's outcome.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use pulse_core::{
    normalize_runs, reduce_lead_times, reduce_runs, AnomalyCounts, EventSource, IngestConfig,
    RunFilter, RunSource,
};
use pulse_state::MetricsStore;

/// Final status of one repository's ingestion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    /// Everything fetched, reduced, and persisted cleanly.
    Succeeded,
    /// Metrics were produced, but with anomalies or a partial sink/fetch
    /// failure. Recomputable next cycle: the source is the system of
    /// record, not the sink.
    Partial,
    /// The repository produced zero metrics this cycle.
    Failed,
}

/// Outcome of one repository's pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RepoOutcome {
    pub repo: String,
    pub status: RepoStatus,
    /// Rows handed to the sink per table.
    pub cfr_rows: usize,
    pub duration_rows: usize,
    pub incident_rows: usize,
    pub lead_time_rows: usize,
    /// Single-event defects seen while reducing.
    pub anomalies: AnomalyCounts,
    /// Reason code when status is not `Succeeded`.
    pub reason: Option<String>,
}

impl RepoOutcome {
    fn failed(repo: &str, reason: String) -> Self {
        Self {
            repo: repo.to_string(),
            status: RepoStatus::Failed,
            cfr_rows: 0,
            duration_rows: 0,
            incident_rows: 0,
            lead_time_rows: 0,
            anomalies: AnomalyCounts::default(),
            reason: Some(reason),
        }
    }
}

/// Pipeline for one repository.
pub struct RepoPipeline;

impl RepoPipeline {
    /// Run the full cycle for `repo`. Never fails outward: every fault is
    /// reported through the returned [`RepoOutcome`].
    pub async fn run(
        source: &dyn EventSource,
        store: &dyn MetricsStore,
        repo: &str,
        config: &IngestConfig,
    ) -> RepoOutcome {
        let started = Utc::now();
        info!(repo = %repo, "starting ingestion cycle");

        let filter = RunFilter {
            branch: config.branch.clone(),
            since: config.window.since,
            until: config.window.until,
        };

        // Run listing is load-bearing: without it the cycle yields nothing.
        let listed = match config.run_source {
            RunSource::WorkflowRuns => source.list_runs(repo, &filter).await,
            RunSource::CheckRuns => source.list_check_runs(repo, &filter).await,
        };
        let raw_runs = match listed {
            Ok(runs) => runs,
            Err(e) => {
                warn!(repo = %repo, error = %e, "run listing failed, skipping repository");
                return RepoOutcome::failed(repo, e.to_string());
            }
        };

        // Change listing failing only loses the lead-time table.
        let mut partial_reason: Option<String> = None;
        let changes = match source.list_merged_changes(repo, config.window.since).await {
            Ok(changes) => changes,
            Err(e) => {
                warn!(repo = %repo, error = %e, "change listing failed, lead times skipped");
                partial_reason = Some(format!("change listing failed: {e}"));
                Vec::new()
            }
        };

        let mut anomalies = AnomalyCounts::default();

        let normalized = normalize_runs(repo, &raw_runs);
        anomalies.record_all(&normalized.anomalies);

        let runs = reduce_runs(normalized.runs);
        anomalies.record_all(&runs.anomalies);

        let lead_times = reduce_lead_times(changes);
        anomalies.record_all(&lead_times.anomalies);

        let mut outcome = RepoOutcome {
            repo: repo.to_string(),
            status: RepoStatus::Succeeded,
            cfr_rows: runs.cfr.len(),
            duration_rows: runs.durations.len(),
            incident_rows: runs.incidents.len(),
            lead_time_rows: lead_times.samples.len(),
            anomalies,
            reason: partial_reason,
        };

        // Each table is its own atomic batch; one failing does not stop
        // the others, it just downgrades the outcome.
        let mut sink_failures = Vec::new();
        if let Err(e) = store.upsert_cfr(&runs.cfr).await {
            sink_failures.push(format!("cfr: {e}"));
        }
        if let Err(e) = store.upsert_durations(&runs.durations).await {
            sink_failures.push(format!("durations: {e}"));
        }
        if let Err(e) = store.upsert_incidents(&runs.incidents).await {
            sink_failures.push(format!("incidents: {e}"));
        }
        if let Err(e) = store.upsert_lead_times(&lead_times.samples).await {
            sink_failures.push(format!("lead_times: {e}"));
        }

        if !sink_failures.is_empty() {
            let joined = sink_failures.join("; ");
            warn!(repo = %repo, failures = %joined, "sink batches failed");
            outcome.reason = Some(match outcome.reason.take() {
                Some(prev) => format!("{prev}; sink: {joined}"),
                None => format!("sink: {joined}"),
            });
            outcome.status = RepoStatus::Partial;
        } else if outcome.anomalies.total() > 0 || outcome.reason.is_some() {
            outcome.status = RepoStatus::Partial;
        }

        info!(
            repo = %repo,
            status = ?outcome.status,
            cfr = outcome.cfr_rows,
            durations = outcome.duration_rows,
            incidents = outcome.incident_rows,
            lead_times = outcome.lead_time_rows,
            anomalies = outcome.anomalies.total(),
            elapsed_ms = (Utc::now() - started).num_milliseconds(),
            "ingestion cycle finished"
        );
        outcome
    }
}

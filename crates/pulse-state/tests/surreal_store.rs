//! Integration tests for the SurrealDB metrics store (mem:// engine).

use chrono::{DateTime, TimeZone, Utc};
use pulse_core::{CfrSample, DurationSample, Incident, LeadTimeSample, RunConclusion};
use pulse_state::{MetricsStore, SurrealMetricsStore};

fn at(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 10, h, 0, 0).unwrap()
}

fn cfr(run_id: i64, conclusion: RunConclusion) -> CfrSample {
    CfrSample {
        repo: "acme/widgets".to_string(),
        run_id,
        conclusion,
        completed_at: at(1),
        failure_reason: None,
    }
}

fn duration(run_id: i64, seconds: i64) -> DurationSample {
    DurationSample {
        repo: "acme/widgets".to_string(),
        run_id,
        duration_seconds: seconds,
        completed_at: at(1),
    }
}

fn incident(failed_run_id: i64, resolved_run_id: i64) -> Incident {
    Incident {
        repo: "acme/widgets".to_string(),
        failed_run_id,
        resolved_run_id,
        failure_time: at(1),
        resolution_time: at(2),
        recovery_seconds: 3600,
    }
}

#[tokio::test]
async fn cfr_batch_upsert_is_idempotent() {
    let store = SurrealMetricsStore::in_memory().await.expect("connect");
    let batch = vec![cfr(1, RunConclusion::Success), cfr(2, RunConclusion::Failure)];

    store.upsert_cfr(&batch).await.expect("first upsert");
    store.upsert_cfr(&batch).await.expect("second upsert");

    let rows = store.cfr_for_repo("acme/widgets").await.expect("read");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].run_id, 1);
    assert_eq!(rows[1].run_id, 2);
}

#[tokio::test]
async fn cfr_reingestion_replaces_values() {
    let store = SurrealMetricsStore::in_memory().await.expect("connect");
    store
        .upsert_cfr(&[cfr(5, RunConclusion::Failure)])
        .await
        .expect("upsert");
    store
        .upsert_cfr(&[cfr(5, RunConclusion::Success)])
        .await
        .expect("upsert");

    let rows = store.cfr_for_repo("acme/widgets").await.expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].conclusion, RunConclusion::Success);
}

#[tokio::test]
async fn duration_upsert_round_trips() {
    let store = SurrealMetricsStore::in_memory().await.expect("connect");
    store
        .upsert_durations(&[duration(9, 480)])
        .await
        .expect("upsert");

    let rows = store.durations_for_repo("acme/widgets").await.expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].duration_seconds, 480);
}

#[tokio::test]
async fn incidents_are_write_once() {
    let store = SurrealMetricsStore::in_memory().await.expect("connect");
    store
        .upsert_incidents(&[incident(1, 2)])
        .await
        .expect("first insert");
    // A later pass pairing the same failure differently must not win.
    store
        .upsert_incidents(&[incident(1, 99)])
        .await
        .expect("second insert");

    let rows = store.incidents_for_repo("acme/widgets").await.expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resolved_run_id, 2);
}

#[tokio::test]
async fn lead_time_upsert_round_trips() {
    let store = SurrealMetricsStore::in_memory().await.expect("connect");
    let sample = LeadTimeSample {
        repo: "acme/widgets".to_string(),
        request_id: 7,
        first_change_at: at(0),
        merged_at: at(3),
        lead_seconds: 3 * 3600,
    };
    store.upsert_lead_times(&[sample]).await.expect("upsert");

    let rows = store.lead_times_for_repo("acme/widgets").await.expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].lead_seconds, 3 * 3600);
}

#[tokio::test]
async fn incident_batch_count_includes_write_once_skips() {
    let store = SurrealMetricsStore::in_memory().await.expect("connect");
    assert_eq!(
        store.upsert_incidents(&[incident(1, 2)]).await.expect("first"),
        1
    );
    // Row 1 already exists and is skipped; the batch still counts as 2.
    assert_eq!(
        store
            .upsert_incidents(&[incident(1, 9), incident(2, 9)])
            .await
            .expect("second"),
        2
    );
    assert_eq!(
        store
            .incidents_for_repo("acme/widgets")
            .await
            .expect("read")
            .len(),
        2
    );
}

#[tokio::test]
async fn local_persistence_engine_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("surrealkv://{}", dir.path().join("db").display());
    let store = SurrealMetricsStore::open(&url).await.expect("connect");

    store
        .upsert_cfr(&[cfr(1, RunConclusion::Failure)])
        .await
        .expect("upsert");

    let rows = store.cfr_for_repo("acme/widgets").await.expect("read");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].conclusion, RunConclusion::Failure);
}

#[tokio::test]
async fn empty_batches_are_no_ops() {
    let store = SurrealMetricsStore::in_memory().await.expect("connect");
    assert_eq!(store.upsert_cfr(&[]).await.expect("cfr"), 0);
    assert_eq!(store.upsert_incidents(&[]).await.expect("incidents"), 0);
    assert!(store
        .cfr_for_repo("acme/widgets")
        .await
        .expect("read")
        .is_empty());
}

#[tokio::test]
async fn repos_do_not_leak_into_each_other() {
    let store = SurrealMetricsStore::in_memory().await.expect("connect");
    let mut other = cfr(1, RunConclusion::Success);
    other.repo = "acme/gadgets".to_string();
    store
        .upsert_cfr(&[cfr(1, RunConclusion::Failure), other])
        .await
        .expect("upsert");

    let widgets = store.cfr_for_repo("acme/widgets").await.expect("read");
    let gadgets = store.cfr_for_repo("acme/gadgets").await.expect("read");
    assert_eq!(widgets.len(), 1);
    assert_eq!(gadgets.len(), 1);
    assert_eq!(widgets[0].conclusion, RunConclusion::Failure);
}

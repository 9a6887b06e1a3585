//! Storage trait definitions for the aggregate sink.
//!
//! [`MetricsStore`] is the single seam between the reduction engine and
//! durable storage. It is async and backend-agnostic; an in-memory fake is
//! provided for testing via the `fakes` module.

use async_trait::async_trait;

use pulse_core::{CfrSample, DurationSample, Incident, LeadTimeSample};

use crate::error::StoreError;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Idempotent, set-based upsert sink for derived metric rows.
///
/// Guarantees:
/// - Each call applies its batch atomically for that table: all rows or
///   none. Cross-table atomicity is not provided.
/// - CFR, duration, and lead-time rows replace prior values for the same
///   natural key (`(repo, run_id)` / `(repo, request_id)`).
/// - Incident rows are write-once on `(repo, failed_run_id)`: an existing
///   row is never overwritten, so the first recorded resolution wins even
///   across re-ingestion passes.
///
/// Each method returns the size of the batch it applied. Rows the
/// write-once rule skips still count: their key is covered either way.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Upsert change-failure-rate rows, latest value wins per key.
    async fn upsert_cfr(&self, batch: &[CfrSample]) -> StoreResult<usize>;

    /// Upsert build-duration rows, latest value wins per key.
    async fn upsert_durations(&self, batch: &[DurationSample]) -> StoreResult<usize>;

    /// Insert incident rows, skipping keys that already exist.
    async fn upsert_incidents(&self, batch: &[Incident]) -> StoreResult<usize>;

    /// Upsert lead-time rows, latest value wins per key.
    async fn upsert_lead_times(&self, batch: &[LeadTimeSample]) -> StoreResult<usize>;
}

//! In-memory fake for the metrics store (testing only)
//!
//! `MemoryMetricsStore` satisfies the [`MetricsStore`] contract without any
//! external dependencies, including per-key replacement and the write-once
//! rule for incidents. Snapshot accessors expose the stored rows so tests
//! can assert persisted state directly.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use pulse_core::{CfrSample, DurationSample, Incident, LeadTimeSample};

use crate::storage_traits::{MetricsStore, StoreResult};

/// Natural key for run-scoped and request-scoped rows.
type Key = (String, i64);

/// In-memory metrics store backed by one `HashMap` per table.
#[derive(Debug, Default)]
pub struct MemoryMetricsStore {
    cfr: Mutex<HashMap<Key, CfrSample>>,
    durations: Mutex<HashMap<Key, DurationSample>>,
    incidents: Mutex<HashMap<Key, Incident>>,
    lead_times: Mutex<HashMap<Key, LeadTimeSample>>,
    /// When set, every upsert fails. Lets tests exercise sink-failure paths.
    fail_writes: Mutex<bool>,
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make all subsequent upserts fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    fn check_writable(&self) -> StoreResult<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(crate::error::StoreError::Backend(
                "injected write failure".to_string(),
            ));
        }
        Ok(())
    }

    /// Stored CFR rows, sorted by key.
    pub fn cfr_rows(&self) -> Vec<CfrSample> {
        Self::sorted(&self.cfr)
    }

    /// Stored duration rows, sorted by key.
    pub fn duration_rows(&self) -> Vec<DurationSample> {
        Self::sorted(&self.durations)
    }

    /// Stored incident rows, sorted by key.
    pub fn incident_rows(&self) -> Vec<Incident> {
        Self::sorted(&self.incidents)
    }

    /// Stored lead-time rows, sorted by key.
    pub fn lead_time_rows(&self) -> Vec<LeadTimeSample> {
        Self::sorted(&self.lead_times)
    }

    fn sorted<V: Clone>(map: &Mutex<HashMap<Key, V>>) -> Vec<V> {
        let map = map.lock().unwrap();
        let mut entries: Vec<(Key, V)> =
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, v)| v).collect()
    }
}

#[async_trait]
impl MetricsStore for MemoryMetricsStore {
    async fn upsert_cfr(&self, batch: &[CfrSample]) -> StoreResult<usize> {
        self.check_writable()?;
        let mut table = self.cfr.lock().unwrap();
        for row in batch {
            table.insert((row.repo.clone(), row.run_id), row.clone());
        }
        Ok(batch.len())
    }

    async fn upsert_durations(&self, batch: &[DurationSample]) -> StoreResult<usize> {
        self.check_writable()?;
        let mut table = self.durations.lock().unwrap();
        for row in batch {
            table.insert((row.repo.clone(), row.run_id), row.clone());
        }
        Ok(batch.len())
    }

    async fn upsert_incidents(&self, batch: &[Incident]) -> StoreResult<usize> {
        self.check_writable()?;
        let mut table = self.incidents.lock().unwrap();
        for row in batch {
            // Write-once: first resolution wins.
            table
                .entry((row.repo.clone(), row.failed_run_id))
                .or_insert_with(|| row.clone());
        }
        Ok(batch.len())
    }

    async fn upsert_lead_times(&self, batch: &[LeadTimeSample]) -> StoreResult<usize> {
        self.check_writable()?;
        let mut table = self.lead_times.lock().unwrap();
        for row in batch {
            table.insert((row.repo.clone(), row.request_id), row.clone());
        }
        Ok(batch.len())
    }
}

//! SurrealDB row types for the four metric tables.
//!
//! Rows store timestamps as RFC3339 strings; conversion to and from the
//! domain types happens at the store boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pulse_core::{CfrSample, DurationSample, Incident, LeadTimeSample, RunConclusion};

use crate::error::StoreError;

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{s}': {e}")))
}

/// Row in the `cfr_runs` table, unique on `(repo, run_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfrRow {
    pub repo: String,
    pub run_id: i64,
    pub conclusion: String,
    pub completed_at: String,
    pub failure_reason: Option<String>,
}

impl From<&CfrSample> for CfrRow {
    fn from(s: &CfrSample) -> Self {
        Self {
            repo: s.repo.clone(),
            run_id: s.run_id,
            conclusion: s.conclusion.as_str().to_string(),
            completed_at: s.completed_at.to_rfc3339(),
            failure_reason: s.failure_reason.clone(),
        }
    }
}

impl TryFrom<CfrRow> for CfrSample {
    type Error = StoreError;

    fn try_from(r: CfrRow) -> Result<Self, StoreError> {
        let conclusion = RunConclusion::parse(&r.conclusion).ok_or_else(|| {
            StoreError::Serialization(format!("bad conclusion '{}'", r.conclusion))
        })?;
        Ok(Self {
            repo: r.repo,
            run_id: r.run_id,
            conclusion,
            completed_at: parse_ts(&r.completed_at)?,
            failure_reason: r.failure_reason,
        })
    }
}

/// Row in the `build_durations` table, unique on `(repo, run_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationRow {
    pub repo: String,
    pub run_id: i64,
    pub duration_seconds: i64,
    pub completed_at: String,
}

impl From<&DurationSample> for DurationRow {
    fn from(s: &DurationSample) -> Self {
        Self {
            repo: s.repo.clone(),
            run_id: s.run_id,
            duration_seconds: s.duration_seconds,
            completed_at: s.completed_at.to_rfc3339(),
        }
    }
}

impl TryFrom<DurationRow> for DurationSample {
    type Error = StoreError;

    fn try_from(r: DurationRow) -> Result<Self, StoreError> {
        Ok(Self {
            repo: r.repo,
            run_id: r.run_id,
            duration_seconds: r.duration_seconds,
            completed_at: parse_ts(&r.completed_at)?,
        })
    }
}

/// Row in the `incidents` table, unique on `(repo, failed_run_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRow {
    pub repo: String,
    pub failed_run_id: i64,
    pub resolved_run_id: i64,
    pub failure_time: String,
    pub resolution_time: String,
    pub recovery_seconds: i64,
}

impl From<&Incident> for IncidentRow {
    fn from(s: &Incident) -> Self {
        Self {
            repo: s.repo.clone(),
            failed_run_id: s.failed_run_id,
            resolved_run_id: s.resolved_run_id,
            failure_time: s.failure_time.to_rfc3339(),
            resolution_time: s.resolution_time.to_rfc3339(),
            recovery_seconds: s.recovery_seconds,
        }
    }
}

impl TryFrom<IncidentRow> for Incident {
    type Error = StoreError;

    fn try_from(r: IncidentRow) -> Result<Self, StoreError> {
        Ok(Self {
            repo: r.repo,
            failed_run_id: r.failed_run_id,
            resolved_run_id: r.resolved_run_id,
            failure_time: parse_ts(&r.failure_time)?,
            resolution_time: parse_ts(&r.resolution_time)?,
            recovery_seconds: r.recovery_seconds,
        })
    }
}

/// Row in the `lead_times` table, unique on `(repo, request_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadTimeRow {
    pub repo: String,
    pub request_id: i64,
    pub first_change_at: String,
    pub merged_at: String,
    pub lead_seconds: i64,
}

impl From<&LeadTimeSample> for LeadTimeRow {
    fn from(s: &LeadTimeSample) -> Self {
        Self {
            repo: s.repo.clone(),
            request_id: s.request_id,
            first_change_at: s.first_change_at.to_rfc3339(),
            merged_at: s.merged_at.to_rfc3339(),
            lead_seconds: s.lead_seconds,
        }
    }
}

impl TryFrom<LeadTimeRow> for LeadTimeSample {
    type Error = StoreError;

    fn try_from(r: LeadTimeRow) -> Result<Self, StoreError> {
        Ok(Self {
            repo: r.repo,
            request_id: r.request_id,
            first_change_at: parse_ts(&r.first_change_at)?,
            merged_at: parse_ts(&r.merged_at)?,
            lead_seconds: r.lead_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cfr_row_round_trips() {
        let sample = CfrSample {
            repo: "o/r".to_string(),
            run_id: 42,
            conclusion: RunConclusion::Failure,
            completed_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            failure_reason: Some("nightly".to_string()),
        };
        let row = CfrRow::from(&sample);
        assert_eq!(row.conclusion, "failure");
        let back = CfrSample::try_from(row).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn bad_timestamp_is_a_serialization_error() {
        let row = DurationRow {
            repo: "o/r".to_string(),
            run_id: 1,
            duration_seconds: 10,
            completed_at: "not-a-time".to_string(),
        };
        assert!(DurationSample::try_from(row).is_err());
    }
}

//! Lead-time reduction: merged change requests into lead-time rows.

use tracing::debug;

use crate::error::Anomaly;
use crate::model::{ChangeRequest, LeadTimeSample};

/// Result of one lead-time reduction pass.
#[derive(Debug, Default)]
pub struct LeadTimeReduction {
    /// One row per valid merged change request.
    pub samples: Vec<LeadTimeSample>,
    /// Requests discarded for negative lead time (clock skew).
    pub anomalies: Vec<Anomaly>,
}

/// Map each merged change request to its lead-time sample.
///
/// `lead_seconds = merged_at - first_change_at`, truncated to whole
/// seconds. Requests merged before their first change are clock-skew
/// anomalies: reported and discarded, never persisted with a negative
/// value.
pub fn reduce_lead_times(requests: Vec<ChangeRequest>) -> LeadTimeReduction {
    let mut reduction = LeadTimeReduction::default();

    for request in requests {
        let lead = request
            .merged_at
            .signed_duration_since(request.first_change_at)
            .num_seconds();
        if lead < 0 {
            debug!(
                repo = %request.repo,
                request_id = request.request_id,
                "dropping change request with negative lead time"
            );
            reduction.anomalies.push(Anomaly::NegativeLeadTime {
                request_id: request.request_id,
            });
            continue;
        }
        reduction.samples.push(LeadTimeSample {
            repo: request.repo,
            request_id: request.request_id,
            first_change_at: request.first_change_at,
            merged_at: request.merged_at,
            lead_seconds: lead,
        });
    }

    reduction
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn one_day_is_86400_seconds() {
        let request = ChangeRequest {
            repo: "o/r".to_string(),
            request_id: 12,
            first_change_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            merged_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        };
        let out = reduce_lead_times(vec![request]);
        assert_eq!(out.samples.len(), 1);
        assert_eq!(out.samples[0].lead_seconds, 86_400);
        assert!(out.anomalies.is_empty());
    }

    #[test]
    fn negative_lead_time_is_discarded_and_reported() {
        let request = ChangeRequest {
            repo: "o/r".to_string(),
            request_id: 13,
            first_change_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            merged_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let out = reduce_lead_times(vec![request]);
        assert!(out.samples.is_empty());
        assert_eq!(
            out.anomalies,
            vec![Anomaly::NegativeLeadTime { request_id: 13 }]
        );
    }

    #[test]
    fn zero_lead_time_is_valid() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let request = ChangeRequest {
            repo: "o/r".to_string(),
            request_id: 14,
            first_change_at: now,
            merged_at: now,
        };
        let out = reduce_lead_times(vec![request]);
        assert_eq!(out.samples[0].lead_seconds, 0);
    }
}

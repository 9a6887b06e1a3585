//! Pulse Core - Event-to-Metric Reduction Engine
//!
//! Derives the four delivery-performance indicators from CI event streams:
//! - Change failure rate (one row per completed run)
//! - Build duration (one row per completed run)
//! - MTTR incidents (failure paired with the next later success)
//! - Lead time for change (merged request paired with its first change)
//!
//! The reducers are pure functions over already-fetched batches; all I/O
//! lives behind the [`EventSource`] trait and the sink crate.

pub mod config;
pub mod error;
pub mod lead_time;
pub mod model;
pub mod normalize;
pub mod reduce;
pub mod source;

pub use config::{IngestConfig, RetryPolicy, RunSource, TimeWindow};
pub use error::{Anomaly, AnomalyCounts, SourceError};
pub use lead_time::{reduce_lead_times, LeadTimeReduction};
pub use model::{
    CfrSample, ChangeRequest, CompletedRun, DurationSample, Incident, LeadTimeSample,
    RunConclusion,
};
pub use normalize::{normalize_run, normalize_runs, Discard, NormalizeOutcome, RawRunEvent};
pub use reduce::{reduce_runs, RunReduction};
pub use source::{EventSource, RunFilter, SourceResult};

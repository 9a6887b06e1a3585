//! Pulse-Ingest - Ingestion Orchestration
//!
//! Drives the event-to-metric pipeline per repository:
//! - `RepoPipeline`: sequential fetch -> normalize -> reduce -> sink
//! - `Orchestrator`: bounded-concurrency fan-out with per-repository
//!   failure isolation and an aggregated report

pub mod orchestrator;
pub mod pipeline;

pub use orchestrator::{IngestReport, Orchestrator};
pub use pipeline::{RepoOutcome, RepoPipeline, RepoStatus};

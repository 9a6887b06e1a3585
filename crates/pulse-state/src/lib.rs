//! Pulse-State: SurrealDB Aggregate Sink for deploypulse
//!
//! This crate provides the persistence layer for derived metric rows. It
//! handles all I/O with SurrealDB behind one trait seam so the reduction
//! engine never touches the database directly.
//!
//! ## Key Components
//!
//! - `MetricsStore`: the upsert sink contract (per-table batch atomicity,
//!   write-once incidents)
//! - `SurrealMetricsStore`: the SurrealDB backend
//! - `fakes::MemoryMetricsStore`: in-memory fake for tests

mod error;
pub mod fakes;
mod migrations;
mod schema;
pub mod storage_traits;
mod surreal_store;

pub use error::{StateError, StoreError};
pub use schema::{CfrRow, DurationRow, IncidentRow, LeadTimeRow};
pub use storage_traits::{MetricsStore, StoreResult};
pub use surreal_store::SurrealMetricsStore;

//! Pulse-GitHub - Event Source Adapter
//!
//! Fetches raw workflow-run, pull-request, and check-run events from the
//! GitHub REST API and exposes them through the `EventSource` seam:
//! - Transparent pagination up to a configured page cap
//! - Bounded rate-limit back-off
//! - Transient vs. permanent failure classification per repository

pub mod client;
pub mod wire;

pub use client::{GithubClient, GithubConfig, GITHUB_ACTIONS_APP};

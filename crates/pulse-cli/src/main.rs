//! deploypulse - Delivery Performance Metrics CLI
//!
//! The `deploypulse` command runs one ingestion pass: it fetches CI runs
//! and merged pull requests for the configured repositories, reduces them
//! to CFR / build-duration / MTTR / lead-time rows, and upserts the rows
//! into the metrics store. Intended to be invoked by a periodic scheduler.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::Level;

use pulse_core::{IngestConfig, RunSource};
use pulse_github::{GithubClient, GithubConfig};
use pulse_ingest::Orchestrator;
use pulse_state::SurrealMetricsStore;

mod telemetry;

#[derive(Parser)]
#[command(name = "deploypulse")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Delivery performance metrics from CI event streams", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion pass over the given repositories
    Run {
        /// Repository to process, `owner/name` form (repeatable)
        #[arg(short, long = "repo", required = true)]
        repos: Vec<String>,

        /// Only events created at or after this instant (RFC3339)
        #[arg(long)]
        since: Option<String>,

        /// Only events created at or before this instant (RFC3339)
        #[arg(long)]
        until: Option<String>,

        /// Restrict runs to this branch (default: each repo's default branch)
        #[arg(long)]
        branch: Option<String>,

        /// Ingest check-runs on merged PR head commits instead of
        /// workflow-run listings
        #[arg(long)]
        check_runs: bool,

        /// Maximum repositories processed in parallel
        #[arg(long, default_value_t = 5)]
        concurrency: usize,

        /// GitHub access token (falls back to GITHUB_TOKEN)
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}

fn parse_instant(label: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let parsed = DateTime::parse_from_rfc3339(&raw)
                .with_context(|| format!("--{label} is not a valid RFC3339 timestamp: {raw}"))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            repos,
            since,
            until,
            branch,
            check_runs,
            concurrency,
            token,
        } => {
            let since = parse_instant("since", since)?;
            let until = parse_instant("until", until)?;

            let mut config = IngestConfig::new(repos)
                .with_window(since, until)
                .with_concurrency(concurrency);
            if let Some(branch) = branch {
                config = config.with_branch(branch);
            }
            if check_runs {
                config = config.with_run_source(RunSource::CheckRuns);
            }

            let mut github = GithubConfig::from_env().with_retry(config.retry);
            if let Some(token) = token {
                github = github.with_token(token);
            }
            let source = Arc::new(GithubClient::new(github));

            let store = Arc::new(
                SurrealMetricsStore::from_env()
                    .await
                    .context("connecting to metrics store")?,
            );

            let report = Orchestrator::new(config).run(source, store).await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.all_failed() {
                bail!("all repositories failed this cycle");
            }
            Ok(())
        }
    }
}

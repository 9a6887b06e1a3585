//! SurrealDB schema migrations and initialization
//!
//! Sets up the four metric tables with the unique indexes that encode each
//! entity's natural identity. Table creation is deployment-time setup, not
//! part of the reduction engine: the store calls this once on connect.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StateError;

/// Initialize all deploypulse tables in SurrealDB.
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<(), StateError> {
    info!("Initializing deploypulse SurrealDB schema");

    init_cfr_table(db).await?;
    init_durations_table(db).await?;
    init_incidents_table(db).await?;
    init_lead_times_table(db).await?;

    info!("deploypulse schema initialization complete");
    Ok(())
}

/// `cfr_runs`: one row per completed run, unique on `(repo, run_id)`.
async fn init_cfr_table(db: &Surreal<Any>) -> Result<(), StateError> {
    debug!("Initializing cfr_runs table");
    let sql = r#"
        DEFINE TABLE cfr_runs SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;

        -- Natural key: re-ingesting the same run replaces, never duplicates
        DEFINE INDEX idx_cfr_repo_run ON TABLE cfr_runs COLUMNS repo, run_id UNIQUE;

        -- Window queries scan by completion time
        DEFINE INDEX idx_cfr_completed ON TABLE cfr_runs COLUMNS completed_at;
    "#;
    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    Ok(())
}

/// `build_durations`: one row per completed run, unique on `(repo, run_id)`.
async fn init_durations_table(db: &Surreal<Any>) -> Result<(), StateError> {
    debug!("Initializing build_durations table");
    let sql = r#"
        DEFINE TABLE build_durations SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX idx_durations_repo_run ON TABLE build_durations COLUMNS repo, run_id UNIQUE;
        DEFINE INDEX idx_durations_completed ON TABLE build_durations COLUMNS completed_at;
    "#;
    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    Ok(())
}

/// `incidents`: one row per resolved failure, unique on `(repo, failed_run_id)`.
///
/// Incident rows are write-once; updates are denied so a later pass can
/// never overwrite the first recorded resolution.
async fn init_incidents_table(db: &Surreal<Any>) -> Result<(), StateError> {
    debug!("Initializing incidents table");
    let sql = r#"
        DEFINE TABLE incidents SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX idx_incidents_repo_failed ON TABLE incidents COLUMNS repo, failed_run_id UNIQUE;
        DEFINE INDEX idx_incidents_failure_time ON TABLE incidents COLUMNS failure_time;
    "#;
    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    Ok(())
}

/// `lead_times`: one row per merged change request, unique on `(repo, request_id)`.
async fn init_lead_times_table(db: &Surreal<Any>) -> Result<(), StateError> {
    debug!("Initializing lead_times table");
    let sql = r#"
        DEFINE TABLE lead_times SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX idx_lead_times_repo_request ON TABLE lead_times COLUMNS repo, request_id UNIQUE;
        DEFINE INDEX idx_lead_times_merged ON TABLE lead_times COLUMNS merged_at;
    "#;
    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    Ok(())
}

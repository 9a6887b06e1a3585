//! Error types for pulse-state

use thiserror::Error;

/// Errors that can occur in the metrics persistence layer
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

/// Errors scoped to one batch upsert.
///
/// A batch fails as a whole: no partial application within a table. The
/// reduction results are recomputable from source, so a sink failure marks
/// the repository partially-failed rather than losing data.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend query error
    #[error("Store query failed: {0}")]
    Backend(String),

    /// Row serialization error
    #[error("Row serialization failed: {0}")]
    Serialization(String),
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
